//! Console output macros for the DevTools CLI.
//!
//! User-facing progress lines go through these macros so every crate prints
//! with the same markers. Structured diagnostics go through `tracing`.

#[macro_export]
macro_rules! dt_println {
    () => {
        println!();
    };
    ($($arg:tt)*) => {
        println!("{}", format!($($arg)*));
    }
}

#[macro_export]
macro_rules! dt_error {
    ($($arg:tt)*) => {
        eprintln!("❌ {}", format!($($arg)*));
    }
}

#[macro_export]
macro_rules! dt_error_hint {
    ($($arg:tt)*) => {
        eprintln!("💡 {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! dt_success {
    ($($arg:tt)*) => {
        eprintln!("✓ {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! dt_info {
    ($($arg:tt)*) => {
        eprintln!("ℹ {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! dt_warning {
    ($($arg:tt)*) => {
        eprintln!("⚠ {}", format!($($arg)*));
    };
}
