use crate::error::{Result, ZeroDceError};

pub trait ParseErrorMapper<T> {
    fn map_parse_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ParseErrorMapper<T> for std::result::Result<T, E> {
    fn map_parse_err(self, context: &str) -> Result<T> {
        self.map_err(|e| ZeroDceError::Parse(format!("{}: {}", context, e)))
    }
}

/// Parses an optional clap argument, `None` when it was not given.
#[macro_export]
macro_rules! parse_param {
    ($app_m:expr, $param:expr, $type:ty, $desc:expr) => {
        if let Some(value) = $app_m.value_of($param) {
            Some(value.parse::<$type>().map_err(|_| {
                $crate::error::ZeroDceError::InvalidParameter(format!("{} must be {}", $param, $desc))
            })?)
        } else {
            None
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_mapping() {
        let result: Result<u32> = "abc".parse::<u32>().map_parse_err("epochs");
        match result {
            Err(ZeroDceError::Parse(msg)) => assert!(msg.starts_with("epochs:")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
