//! Evaluates a parsed [`Query`] against a [`GraphBackend`], expanding
//! `MATCH` patterns into variable bindings, applying `WHERE`, projecting
//! `RETURN` items, and running `CREATE` through a [`GraphWriter`].

use crate::ast::{
    Clause, CompareOp, CreateClause, EdgeDirection, EdgePattern, Expr, MatchClause, NodePattern,
    Query, ReturnClause,
};
use crate::error::{QueryError, Result};
use crate::planner::{candidate_nodes, literal_to_value, node_matches_pattern};
use graphdb_api::{GraphBackend, GraphWriter, NodeId, Value};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub count: usize,
    pub elapsed_time: Duration,
}

type Binding = HashMap<String, NodeId>;

/// A binding plus the id of the node the pattern chain most recently
/// reached, used to anchor the next hop even when that node has no
/// variable name of its own.
#[derive(Clone)]
struct PartialMatch {
    vars: Binding,
    anchor: NodeId,
}

pub fn execute(query: &Query, backend: &dyn GraphBackend, writer: &dyn GraphWriter) -> Result<QueryResult> {
    let started = Instant::now();
    let mut bindings: Vec<Binding> = vec![HashMap::new()];
    let mut where_expr: Option<&Expr> = None;
    let mut return_clause: Option<&ReturnClause> = None;

    for clause in &query.clauses {
        match clause {
            Clause::Match(m) => bindings = expand_match(backend, &bindings, m)?,
            Clause::Where(expr) => where_expr = Some(expr),
            Clause::Return(r) => return_clause = Some(r),
            Clause::Create(c) => bindings = run_create(writer, &bindings, c)?,
        }
    }

    if let Some(expr) = where_expr {
        let mut kept = Vec::with_capacity(bindings.len());
        for binding in bindings {
            if eval_predicate(expr, &binding, backend)? {
                kept.push(binding);
            }
        }
        bindings = kept;
    }

    let Some(return_clause) = return_clause else {
        return Ok(QueryResult {
            columns: Vec::new(),
            rows: Vec::new(),
            count: bindings.len(),
            elapsed_time: started.elapsed(),
        });
    };

    let columns: Vec<String> = return_clause
        .items
        .iter()
        .map(|item| item.alias.clone().unwrap_or_else(|| describe_expr(&item.expr)))
        .collect();

    let mut rows = Vec::with_capacity(bindings.len());
    for binding in &bindings {
        let mut row = Vec::with_capacity(return_clause.items.len());
        for item in &return_clause.items {
            row.push(eval_value(&item.expr, binding, backend)?);
        }
        rows.push(row);
    }
    // Deterministic row order: bindings come out in whatever order the
    // backend's scans produced them, so sort on the projected values to
    // make repeated runs over the same data byte-for-byte identical.
    rows.sort_by(|a, b| compare_rows(a, b));

    let count = rows.len();
    Ok(QueryResult {
        columns,
        rows,
        count,
        elapsed_time: started.elapsed(),
    })
}

fn compare_rows(a: &[Value], b: &[Value]) -> std::cmp::Ordering {
    for (va, vb) in a.iter().zip(b.iter()) {
        if let Ok(ordering) = va.compare(vb) {
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
    }
    std::cmp::Ordering::Equal
}

fn expand_match(backend: &dyn GraphBackend, bindings: &[Binding], clause: &MatchClause) -> Result<Vec<Binding>> {
    let candidates = candidate_nodes(backend, &clause.nodes[0])?;
    let mut partials: Vec<PartialMatch> = Vec::new();
    for base in bindings {
        for node in &candidates {
            if !node_matches_pattern(node, &clause.nodes[0]) {
                continue;
            }
            let mut vars = base.clone();
            if let Some(var) = &clause.nodes[0].variable {
                vars.insert(var.clone(), node.id);
            }
            partials.push(PartialMatch { vars, anchor: node.id });
        }
    }

    for (edge_pattern, node_pattern) in clause.edges.iter().zip(clause.nodes.iter().skip(1)) {
        let mut next = Vec::new();
        for partial in &partials {
            next.extend(step(backend, partial, edge_pattern, node_pattern)?);
        }
        partials = next;
    }

    Ok(partials.into_iter().map(|p| p.vars).collect())
}

fn step(
    backend: &dyn GraphBackend,
    partial: &PartialMatch,
    edge_pattern: &EdgePattern,
    node_pattern: &NodePattern,
) -> Result<Vec<PartialMatch>> {
    let edges = match edge_pattern.direction {
        EdgeDirection::Out => backend.outgoing_edges(partial.anchor)?,
        EdgeDirection::In => backend.incoming_edges(partial.anchor)?,
    };
    let mut result = Vec::new();
    for edge in edges {
        if let Some(expected) = &edge_pattern.edge_type {
            if &edge.edge_type != expected {
                continue;
            }
        }
        let other_id = match edge_pattern.direction {
            EdgeDirection::Out => edge.to_id,
            EdgeDirection::In => edge.from_id,
        };
        let node = backend.get_node(other_id)?;
        if !node_matches_pattern(&node, node_pattern) {
            continue;
        }
        let mut vars = partial.vars.clone();
        if let Some(var) = &node_pattern.variable {
            vars.insert(var.clone(), node.id);
        }
        if let Some(var) = &edge_pattern.variable {
            vars.insert(var.clone(), edge.id);
        }
        result.push(PartialMatch { vars, anchor: node.id });
    }
    Ok(result)
}

fn run_create(writer: &dyn GraphWriter, bindings: &[Binding], clause: &CreateClause) -> Result<Vec<Binding>> {
    let mut result = Vec::with_capacity(bindings.len());
    for base in bindings {
        let labels = clause.node.label.iter().cloned().collect::<Vec<_>>();
        let properties = clause
            .node
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), literal_to_value(v)))
            .collect();
        let node = writer.create_node(labels, properties)?;
        let mut next = base.clone();
        if let Some(var) = &clause.node.variable {
            next.insert(var.clone(), node.id);
        }
        result.push(next);
    }
    Ok(result)
}

fn eval_predicate(expr: &Expr, binding: &Binding, backend: &dyn GraphBackend) -> Result<bool> {
    match eval_value(expr, binding, backend)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(QueryError::eval(
            format!("predicate did not evaluate to a boolean, found {}", other.type_name()),
            describe_expr(expr),
        )),
    }
}

fn eval_value(expr: &Expr, binding: &Binding, backend: &dyn GraphBackend) -> Result<Value> {
    match expr {
        Expr::Literal(lit) => Ok(literal_to_value(lit)),
        Expr::Variable(name) => match binding.get(name) {
            Some(&id) => Ok(Value::Int(id as i64)),
            None => Err(QueryError::eval(format!("unbound variable `{name}`"), describe_expr(expr))),
        },
        Expr::Property(name, key) => {
            let Some(&id) = binding.get(name) else {
                return Err(QueryError::eval(format!("unbound variable `{name}`"), describe_expr(expr)));
            };
            let node = backend.get_node(id).map_err(QueryError::from)?;
            Ok(node.properties.get(key).cloned().unwrap_or(Value::Null))
        }
        Expr::Compare(left, op, right) => {
            let lv = eval_value(left, binding, backend)?;
            let rv = eval_value(right, binding, backend)?;
            if matches!(lv, Value::Null) || matches!(rv, Value::Null) {
                return Ok(Value::Bool(false));
            }
            let ordering = lv
                .compare(&rv)
                .map_err(|e| QueryError::eval(e.to_string(), describe_expr(expr)))?;
            let result = match op {
                CompareOp::Eq => ordering.is_eq(),
                CompareOp::Ne => !ordering.is_eq(),
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Gt => ordering.is_gt(),
                CompareOp::Ge => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        Expr::And(left, right) => {
            Ok(Value::Bool(eval_predicate(left, binding, backend)? && eval_predicate(right, binding, backend)?))
        }
        Expr::Or(left, right) => {
            Ok(Value::Bool(eval_predicate(left, binding, backend)? || eval_predicate(right, binding, backend)?))
        }
        Expr::Not(inner) => Ok(Value::Bool(!eval_predicate(inner, binding, backend)?)),
        Expr::IsNull(inner) => Ok(Value::Bool(matches!(eval_value(inner, binding, backend)?, Value::Null))),
        Expr::IsNotNull(inner) => Ok(Value::Bool(!matches!(eval_value(inner, binding, backend)?, Value::Null))),
    }
}

fn describe_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Variable(name) => {
            let _ = write!(out, "{name}");
        }
        Expr::Property(name, key) => {
            let _ = write!(out, "{name}.{key}");
        }
        Expr::Literal(lit) => {
            let _ = write!(out, "{lit:?}");
        }
        Expr::Compare(l, op, r) => {
            write_expr(out, l);
            let _ = write!(out, " {op:?} ");
            write_expr(out, r);
        }
        Expr::And(l, r) => {
            write_expr(out, l);
            out.push_str(" AND ");
            write_expr(out, r);
        }
        Expr::Or(l, r) => {
            write_expr(out, l);
            out.push_str(" OR ");
            write_expr(out, r);
        }
        Expr::Not(inner) => {
            out.push_str("NOT ");
            write_expr(out, inner);
        }
        Expr::IsNull(inner) => {
            write_expr(out, inner);
            out.push_str(" IS NULL");
        }
        Expr::IsNotNull(inner) => {
            write_expr(out, inner);
            out.push_str(" IS NOT NULL");
        }
    }
}
