//! Rendering of [`Select`] plans as PostgREST query parameters.
//!
//! `neq` in PostgREST drops NULL rows, so [`Filter::Ne`] is rendered as
//! `or=(col.is.null,col.neq.value)` to keep nulls passing like the other
//! backends. Several such filters are combined under one `and=(...)`.

use crate::models::ListOptions;
use crate::storage::query::{Filter, Select};
use crate::{Error, Result};
use serde_json::Value;

/// Query string pairs.
pub type Params = Vec<(String, String)>;

/// Renders filters, ordering and window.
pub fn select_params(select: &Select) -> Result<Params> {
    let mut params = filter_params(select)?;
    if let Some(order) = order_param(select) {
        params.push(("order".to_string(), order));
    }
    params.extend(window_params(select.window));
    Ok(params)
}

/// Renders only the filters (for PATCH, DELETE and counts).
pub fn filter_params(select: &Select) -> Result<Params> {
    let mut params = Params::new();
    let mut negations = Vec::new();
    for filter in &select.filters {
        let column = filter.column();
        if select.table.field(column).is_none() {
            return Err(Error::InvalidInput(format!(
                "table '{}' has no column '{column}'",
                select.table.name
            )));
        }
        match filter {
            Filter::Eq(_, Value::Null) | Filter::IsNull(_) => {
                params.push((column.to_string(), "is.null".to_string()));
            },
            Filter::Eq(_, value) => {
                params.push((column.to_string(), format!("eq.{}", literal(value))));
            },
            Filter::NotNull(_) => {
                params.push((column.to_string(), "not.is.null".to_string()));
            },
            Filter::Ne(_, Value::Null) => {
                params.push((column.to_string(), "not.is.null".to_string()));
            },
            Filter::Ne(_, value) => {
                negations.push(format!("{column}.is.null,{column}.neq.{}", quoted(value)));
            },
            Filter::Contains(_, needle) => {
                params.push((column.to_string(), format!("cs.{needle}")));
            },
        }
    }
    match negations.as_slice() {
        [] => {},
        [single] => params.push(("or".to_string(), format!("({single})"))),
        many => {
            let groups: Vec<String> = many.iter().map(|n| format!("or({n})")).collect();
            params.push(("and".to_string(), format!("({})", groups.join(","))));
        },
    }
    Ok(params)
}

fn order_param(select: &Select) -> Option<String> {
    if select.order.is_empty() {
        return None;
    }
    let keys: Vec<String> = select
        .order
        .iter()
        .map(|o| {
            if o.descending {
                format!("{}.desc.nullslast", o.column)
            } else {
                format!("{}.asc.nullsfirst", o.column)
            }
        })
        .collect();
    Some(keys.join(","))
}

fn window_params(window: ListOptions) -> Params {
    let mut params = Params::new();
    if let Some(limit) = window.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    if window.offset > 0 {
        params.push(("offset".to_string(), window.offset.to_string()));
    }
    params
}

/// Filter operand as PostgREST expects it in a plain `col=op.value` pair.
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Filter operand inside a logical tree, where `,` `(` `)` are reserved.
fn quoted(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        other => other.to_string(),
    }
}
