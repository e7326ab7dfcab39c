//! Custom assertion macros and utilities

/// Assert that a result is ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert that every record in `$records` has status `$status`
#[macro_export]
macro_rules! assert_all_status {
    ($records:expr, $status:expr) => {
        for record in &$records {
            assert_eq!(
                record.status, $status,
                "{} {} is {}, expected {}",
                record.category, record.local_id, record.status, $status
            );
        }
    };
}
