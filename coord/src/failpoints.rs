use fail::fail_point;

use crate::bail;
use crate::error::{CoordResult, ErrorKind};

/// Evaluated by a worker right before it takes the next job from the queue.
pub const WORKER_POOL__BEFORE_JOB: &str = "worker_pool.before_job";

pub fn coord_fail_point(name: &str) -> CoordResult<()> {
    fail_point!(name, |parameter| {
        let detail = match parameter {
            Some(parameter) => format!("The failpoint '{name}' returned an error: {parameter}"),
            None => format!("The failpoint '{name}' returned an error"),
        };

        bail!(
            ErrorKind::InjectedFault,
            "An error occurred in a fail point",
            detail
        );
    });

    Ok(())
}
