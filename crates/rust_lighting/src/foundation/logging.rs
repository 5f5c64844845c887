//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system
///
/// Safe to call more than once; later calls are ignored so tests and host
/// applications can both initialize without coordinating.
pub fn init() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        init();
        init();
        debug!("logger initialized");
    }
}
