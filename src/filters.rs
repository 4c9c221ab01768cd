use std::fmt::Display;

// Formats an amount as dollars with two decimals: `{{ total|money }}`.
pub fn money<T: Display>(value: T) -> askama::Result<String> {
    Ok(format!("${:.2}", value))
}
