use crate::color::{MaybePaint, ERROR_INDICATOR, ERROR_TEXT, WARNING_INDICATOR, WARNING_TEXT};

pub const DEFAULT_EXIT_CODE: i32 = 1;

pub(crate) fn fmt_error(text: &str) -> String {
    format!(
        "{} {}",
        ERROR_INDICATOR.maybe_paint("error:"),
        ERROR_TEXT.maybe_paint(text)
    )
}

pub(crate) fn fmt_warn(text: &str) -> String {
    format!(
        "{} {}",
        WARNING_INDICATOR.maybe_paint("warning:"),
        WARNING_TEXT.maybe_paint(text)
    )
}

pub(crate) fn error_internal(text: &str) {
    eprintln!("{}", fmt_error(text));
}

pub(crate) fn warn_internal(text: &str) {
    eprintln!("{}", fmt_warn(text));
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::warn_internal(&formatted);
    })
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
    })
}

#[macro_export]
macro_rules! die {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
        ::std::process::exit($crate::utils::errors::DEFAULT_EXIT_CODE);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ColorMode;
    use crate::color::configure_color;

    #[test]
    fn plain_messages_without_color() {
        configure_color(ColorMode::Off);

        assert_eq!(fmt_error("no providers"), "error: no providers");
        assert_eq!(fmt_warn("stale catalog"), "warning: stale catalog");
    }
}
