//! Host shutdown seam

/// Implemented by the host so the launcher can ask it to exit
///
/// `hard` requests an immediate stop so a supervisor can restart the
/// process; a soft request lets the host finish its current work first,
/// used when a detached helper waits for this process to exit.
pub trait ShutdownHook: Send + Sync {
    fn request_shutdown(&self, hard: bool);
}
