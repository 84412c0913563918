use std::collections::HashMap;

use crate::error::SqlScopeError;
use crate::types::RowValues;

/// One execution's worth of parameter values, keyed by parameter name.
pub type NamedParams = HashMap<String, RowValues>;

/// Build a [`NamedParams`] mapping from `name => value` pairs.
///
/// Values go through `Into<RowValues>`, so plain Rust scalars work:
/// ```rust
/// use sql_scope::named_params;
///
/// let params = named_params! { "name" => "a", "age" => 42 };
/// assert_eq!(params.len(), 2);
/// let empty = named_params! {};
/// assert!(empty.is_empty());
/// ```
#[macro_export]
macro_rules! named_params {
    () => {
        $crate::NamedParams::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::NamedParams::new();
        $(
            params.insert(
                ::std::string::String::from($name),
                $crate::RowValues::from($value),
            );
        )+
        params
    }};
}

/// Order the values of `params` to match `names`, the parameter list produced by translation.
///
/// Stops at the first name that has no entry in the mapping. A name that occurs more than once
/// in `names` is looked up again for every occurrence.
///
/// # Errors
/// Returns [`SqlScopeError::MissingParameter`] naming the first absent key.
pub fn bind_params(
    params: &NamedParams,
    names: &[String],
) -> Result<Vec<RowValues>, SqlScopeError> {
    let mut ordered = Vec::with_capacity(names.len());
    for name in names {
        let value = params
            .get(name)
            .ok_or_else(|| SqlScopeError::MissingParameter(name.clone()))?;
        ordered.push(value.clone());
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn orders_values_by_name_list() {
        let params = named_params! { "password" => "b", "name" => "a" };
        let bound = bind_params(&params, &names(&["name", "password"])).unwrap();
        assert_eq!(
            bound,
            vec![RowValues::Text("a".into()), RowValues::Text("b".into())]
        );
    }

    #[test]
    fn repeated_name_reuses_the_value() {
        let params = named_params! { "id" => 7 };
        let bound = bind_params(&params, &names(&["id", "id", "id"])).unwrap();
        assert_eq!(bound, vec![RowValues::Int(7); 3]);
    }

    #[test]
    fn reports_first_missing_name_only() {
        let params = named_params! { "a" => 1 };
        let err = bind_params(&params, &names(&["a", "b", "c"])).unwrap_err();
        match err {
            SqlScopeError::MissingParameter(name) => assert_eq!(name, "b"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn extra_entries_are_ignored() {
        let params = named_params! { "a" => 1, "unused" => "x" };
        let bound = bind_params(&params, &names(&["a"])).unwrap();
        assert_eq!(bound, vec![RowValues::Int(1)]);
    }

    #[test]
    fn empty_list_binds_nothing() {
        let bound = bind_params(&NamedParams::new(), &[]).unwrap();
        assert!(bound.is_empty());
    }
}
