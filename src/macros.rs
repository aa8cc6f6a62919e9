/// Lazily compiled, process-wide `Regex` for a literal pattern.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Build an [`Attributes`](crate::Attributes) list from `name => value` pairs.
///
/// ```
/// let attrs = digester::attrs! { "id" => "7", "lang" => "en" };
/// assert_eq!(attrs.get("lang"), Some("en"));
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::Attributes::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::Attributes::new()$(.with($name, $value))+
    };
}

/// Register several rules under one pattern, in order.
///
/// ```ignore
/// register!(digester, "catalog/book" => [
///     ObjectCreateRule::new("Book"),
///     SetPropertiesRule::new(),
///     LinkRule::set_next("addBook"),
/// ])?;
/// ```
#[macro_export]
macro_rules! register {
    ($digester:expr, $pattern:expr => [ $($rule:expr),* $(,)? ]) => {{
        let result: Result<(), $crate::DigestError> = (|| {
            $( $digester.add_rule($pattern, $rule)?; )*
            Ok(())
        })();
        result
    }};
}
