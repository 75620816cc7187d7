//! Macros for declaring the typed builtin methods on [`Chain`](super::Chain).

/// Expands `is_email => "isEmail";` or `is_length => "isLength"(options);`
/// into a by-value builder method that forwards to `Chain::method`, with each
/// listed argument taken as `impl Into<serde_json::Value>`.
///
/// A trailing `| is_int_with(options)` also declares a second method that
/// takes the method's full option list.
macro_rules! builtin_methods {
    ($(
        $(#[$doc:meta])*
        $method:ident => $name:literal $(( $($arg:ident),* ))? $(| $with:ident ( $($warg:ident),* ))? ;
    )*) => {
        $(
            $(#[$doc])*
            pub fn $method(self $($(, $arg: impl Into<serde_json::Value>)*)?) -> Self {
                self.method($name, vec![$($($arg.into()),*)?])
            }

            $(
                #[doc = concat!("`", $name, "` with explicit options.")]
                pub fn $with(self $(, $warg: impl Into<serde_json::Value>)*) -> Self {
                    self.method($name, vec![$($warg.into()),*])
                }
            )?
        )*
    };
}

pub(crate) use builtin_methods;
