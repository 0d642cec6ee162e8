//! Enum accessor macros
//!
//! These macros eliminate repetitive `matches!` code on the crate's tagged
//! enums (`Patch`, `Effect`). They use `paste` for identifier concatenation.

// =============================================================================
// Variant predicate generation
// =============================================================================

/// Generate `is_xxx` predicates for enum variants
///
/// Variant names are converted with paste's `:snake` modifier, so
/// `UpdateProps` becomes `is_update_props`. Works for unit, tuple and struct
/// variants alike.
///
/// # Example
/// ```ignore
/// impl Patch {
///     impl_enum_accessors!(Insert, Remove, Move, UpdateProps, Replace);
/// }
/// ```
macro_rules! impl_enum_accessors {
    ($($variant:ident),* $(,)?) => {
        ::paste::paste! {
            $(
                #[doc = "Check if this is a `" $variant "`"]
                #[inline]
                pub fn [<is_ $variant:snake>](&self) -> bool {
                    matches!(self, Self::$variant { .. })
                }
            )*
        }
    };
}

pub(crate) use impl_enum_accessors;

#[cfg(test)]
mod tests {
    #[allow(dead_code)]
    enum Sample {
        Plain,
        Wrapped(u8),
        LongerName { value: u8 },
    }

    impl Sample {
        impl_enum_accessors!(Plain, Wrapped, LongerName);
    }

    #[test]
    fn test_generated_predicates() {
        assert!(Sample::Plain.is_plain());
        assert!(Sample::Wrapped(1).is_wrapped());
        assert!(Sample::LongerName { value: 2 }.is_longer_name());
        assert!(!Sample::Plain.is_wrapped());
    }
}
