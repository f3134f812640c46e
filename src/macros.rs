/// Compose a message and hand it to the config's logger.
macro_rules! log {
    ($config:expr, $level:ident, $($arg:tt)*) => {
        $config.log($crate::LogLevel::$level, format_args!($($arg)*))
    };
}
