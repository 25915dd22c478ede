//! Macros for ergonomic state value construction.

/// Build a [`StateValue`](crate::core::StateValue) from a literal.
///
/// A string becomes a leaf, `{ "key" => value, .. }` a branch.
///
/// # Example
///
/// ```
/// use mindset_statechart::core::StateValue;
/// use mindset_statechart::state_value;
///
/// let value = state_value!({
///     "fetch" => "idle",
///     "ui" => { "panel" => "open" },
/// });
///
/// assert_eq!(value, StateValue::from_paths(["/fetch/idle", "/ui/panel/open"]));
/// assert_eq!(state_value!("idle"), StateValue::from("idle"));
/// ```
#[macro_export]
macro_rules! state_value {
    ({ $($key:literal => $value:tt),* $(,)? }) => {{
        #[allow(unused_mut)]
        let mut map = ::std::collections::BTreeMap::new();
        $(
            map.insert(::std::string::String::from($key), $crate::state_value!($value));
        )*
        $crate::core::StateValue::Branch(map)
    }};
    ($leaf:expr) => {
        $crate::core::StateValue::from($leaf)
    };
}
