mod cache_test;
mod cancel_test;
mod fan_in_test;
mod pool_test;
mod semaphore_test;
