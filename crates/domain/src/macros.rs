//! Macro for implementing Display and FromStr for persisted enums
//!
//! Enums that are written to the settings store or embedded in webhook
//! payloads use a single lowercase spelling. This macro keeps the `Display`
//! and `FromStr` implementations in one place so the two can never drift.
//!
//! # Example
//!
//! ```rust
//! use healthhook_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Transport {
//!     Https,
//!     Loopback,
//! }
//!
//! impl_domain_enum_conversions!(Transport {
//!     Https => "https",
//!     Loopback => "loopback",
//! });
//! ```

/// Implements Display and FromStr traits for persisted enums
///
/// This macro generates:
/// - Display trait: converts enum variants to their stored spelling
/// - FromStr trait: parses case-insensitive strings to enum variants
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their lowercase string
///   representations
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
