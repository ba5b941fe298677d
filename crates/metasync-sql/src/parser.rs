//! View definition parsing
//!
//! Extracts, from a view's SELECT statement:
//! - alias/bare-name → referenced table, for every FROM/JOIN table factor
//! - the ordered, deduplicated upstream table list
//! - target column → source column references from the SELECT list
//!
//! Wildcard selections (`*`, `t.*`) and expressions without a resolvable
//! target column name are skipped. Subqueries, set operations and other
//! statement shapes yield an empty result rather than an error; only a
//! parser failure surfaces as `LineageParseError`.

use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, FunctionArguments, Select, SelectItem, SetExpr, Statement,
    TableFactor,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::{Parser, ParserError};
use std::collections::HashMap;
use thiserror::Error;

/// A table reference from a FROM/JOIN clause, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Explicit schema qualifier, when the SQL carries one.
    pub schema: Option<String>,
    pub name: String,
}

/// A source column reference from the SELECT list, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Table alias or bare table name qualifying the column, if any.
    pub qualifier: Option<String>,
    pub column: String,
}

/// One target column of the view and the source columns feeding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub to_column: String,
    pub from: Vec<ColumnRef>,
}

/// Everything lineage resolution needs from one view definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLineage {
    /// Lower-cased alias or bare table name → referenced table.
    pub alias_to_table: HashMap<String, TableRef>,

    /// Distinct FROM/JOIN tables in appearance order.
    pub upstream_tables: Vec<TableRef>,

    /// SELECT-list column mappings in appearance order.
    pub column_mappings: Vec<ColumnMapping>,
}

/// A view definition the SQL parser rejected.
#[derive(Debug, Error)]
#[error("failed to parse view SQL: {0}")]
pub struct LineageParseError(#[from] ParserError);

/// Parse a view's SQL definition into its lineage triple.
pub fn parse_view_sql(sql: &str) -> Result<ParsedLineage, LineageParseError> {
    if sql.trim().is_empty() {
        return Ok(ParsedLineage::default());
    }

    let statements = Parser::parse_sql(&GenericDialect {}, sql)?;

    let select = match statements.first() {
        Some(Statement::Query(query)) => match query.body.as_ref() {
            SetExpr::Select(select) => select.as_ref().clone(),
            _ => return Ok(ParsedLineage::default()),
        },
        _ => return Ok(ParsedLineage::default()),
    };

    let alias_to_table = extract_alias_map(&select);
    let upstream_tables = extract_upstream_tables(&select);
    let column_mappings = extract_column_mappings(&select);

    Ok(ParsedLineage {
        alias_to_table,
        upstream_tables,
        column_mappings,
    })
}

fn extract_alias_map(select: &Select) -> HashMap<String, TableRef> {
    let mut out = HashMap::new();

    for table_with_joins in &select.from {
        add_table_factor(&table_with_joins.relation, &mut out);
        for join in &table_with_joins.joins {
            add_table_factor(&join.relation, &mut out);
        }
    }

    out
}

fn add_table_factor(factor: &TableFactor, out: &mut HashMap<String, TableRef>) {
    // Derived tables, table functions and the rest are ignored: lineage is
    // best-effort over plain table references.
    if let TableFactor::Table { name, alias, .. } = factor {
        let mut parts: Vec<String> = name.0.iter().map(|ident| ident.value.clone()).collect();
        let Some(table_name) = parts.pop() else {
            return;
        };
        let schema = parts.pop();

        let table_ref = TableRef {
            schema,
            name: table_name.clone(),
        };

        if let Some(alias) = alias {
            out.insert(norm_key(&alias.name.value), table_ref.clone());
        }
        out.insert(norm_key(&table_name), table_ref);
    }
}

fn extract_upstream_tables(select: &Select) -> Vec<TableRef> {
    let mut out: Vec<TableRef> = Vec::new();

    let mut push = |factor: &TableFactor| {
        if let TableFactor::Table { name, .. } = factor {
            let mut parts: Vec<String> = name.0.iter().map(|ident| ident.value.clone()).collect();
            if let Some(table_name) = parts.pop() {
                let table_ref = TableRef {
                    schema: parts.pop(),
                    name: table_name,
                };
                if !out.contains(&table_ref) {
                    out.push(table_ref);
                }
            }
        }
    };

    for table_with_joins in &select.from {
        push(&table_with_joins.relation);
        for join in &table_with_joins.joins {
            push(&join.relation);
        }
    }

    out
}

fn extract_column_mappings(select: &Select) -> Vec<ColumnMapping> {
    let mut out = Vec::new();

    for item in &select.projection {
        let (target, expr) = match item {
            // A bare column ref without alias names the target after itself.
            SelectItem::UnnamedExpr(expr) => match target_from_expr(expr) {
                Some(name) => (name, expr),
                None => continue,
            },
            SelectItem::ExprWithAlias { expr, alias } => (alias.value.clone(), expr),
            // `*` and `t.*` carry no per-column target.
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..) => continue,
        };

        let mut from = Vec::new();
        collect_column_refs(expr, &mut from);

        if !from.is_empty() {
            out.push(ColumnMapping {
                to_column: target,
                from,
            });
        }
    }

    out
}

/// Target column name for an unaliased SELECT item: only a plain column
/// reference qualifies, everything else (function calls, arithmetic) has
/// no resolvable name and is skipped.
fn target_from_expr(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|ident| ident.value.clone()),
        _ => None,
    }
}

fn collect_column_refs(expr: &Expr, out: &mut Vec<ColumnRef>) {
    match expr {
        Expr::Identifier(ident) => push_ref(out, None, &ident.value),
        Expr::CompoundIdentifier(parts) => {
            if let [qualifier @ .., column] = parts.as_slice() {
                let qualifier = qualifier.last().map(|ident| ident.value.clone());
                push_ref(out, qualifier, &column.value);
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_column_refs(left, out);
            collect_column_refs(right, out);
        }
        Expr::UnaryOp { expr, .. } => collect_column_refs(expr, out),
        Expr::Nested(inner) => collect_column_refs(inner, out),
        Expr::Cast { expr, .. } => collect_column_refs(expr, out),
        Expr::IsNull(inner) | Expr::IsNotNull(inner) => collect_column_refs(inner, out),
        Expr::Case {
            operand,
            conditions,
            results,
            else_result,
        } => {
            if let Some(operand) = operand {
                collect_column_refs(operand, out);
            }
            for condition in conditions {
                collect_column_refs(condition, out);
            }
            for result in results {
                collect_column_refs(result, out);
            }
            if let Some(else_result) = else_result {
                collect_column_refs(else_result, out);
            }
        }
        Expr::Function(function) => {
            if let FunctionArguments::List(list) = &function.args {
                for arg in &list.args {
                    let arg_expr = match arg {
                        FunctionArg::Named { arg, .. }
                        | FunctionArg::ExprNamed { arg, .. } => arg,
                        FunctionArg::Unnamed(arg) => arg,
                    };
                    if let FunctionArgExpr::Expr(expr) = arg_expr {
                        collect_column_refs(expr, out);
                    }
                }
            }
        }
        _ => {}
    }
}

fn push_ref(out: &mut Vec<ColumnRef>, qualifier: Option<String>, column: &str) {
    let column_ref = ColumnRef {
        qualifier,
        column: column.to_string(),
    };
    if !out.contains(&column_ref) {
        out.push(column_ref);
    }
}

/// Lower-cased, quote-stripped key for the alias map.
pub(crate) fn norm_key(raw: &str) -> String {
    norm_ident(raw).to_lowercase()
}

/// Trim whitespace and strip one layer of double quotes.
pub(crate) fn norm_ident(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    stripped.to_string()
}
