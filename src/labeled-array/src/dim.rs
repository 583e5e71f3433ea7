// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Axis metadata: an expression plus one instance per tick.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tracing::debug;

use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::expression::DimExpression;
use crate::filter::Filter;
use crate::index::{Index, Position, Resolved, Step, slice_positions};
use crate::value::{Instance, Value};
use crate::{index_err, lookup_err, namespace_err};

static NEXT_DIM_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_DIM_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// One tick as given by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum TickSpec {
    Blank,
    /// Parsed through the dimension expression.
    Text(String),
    Record(Instance),
}

impl From<&str> for TickSpec {
    fn from(s: &str) -> Self {
        TickSpec::Text(s.to_string())
    }
}

impl From<String> for TickSpec {
    fn from(s: String) -> Self {
        TickSpec::Text(s)
    }
}

impl From<&String> for TickSpec {
    fn from(s: &String) -> Self {
        TickSpec::Text(s.clone())
    }
}

impl From<i32> for TickSpec {
    fn from(n: i32) -> Self {
        TickSpec::Text(n.to_string())
    }
}

impl From<i64> for TickSpec {
    fn from(n: i64) -> Self {
        TickSpec::Text(n.to_string())
    }
}

impl From<Instance> for TickSpec {
    fn from(i: Instance) -> Self {
        TickSpec::Record(i)
    }
}

impl<T: Into<TickSpec>> From<Option<T>> for TickSpec {
    fn from(tick: Option<T>) -> Self {
        match tick {
            Some(t) => t.into(),
            None => TickSpec::Blank,
        }
    }
}

/// Rank of a tick under a sort key.
#[derive(Clone, Debug, PartialEq)]
pub enum SortRank {
    First,
    Value(Value),
    Last,
}

impl SortRank {
    fn cmp_rank(&self, other: &SortRank) -> Ordering {
        match (self, other) {
            (SortRank::Value(a), SortRank::Value(b)) => a.total_cmp(b),
            _ => self.order().cmp(&other.order()),
        }
    }

    fn order(&self) -> u8 {
        match self {
            SortRank::First => 0,
            SortRank::Value(_) => 1,
            SortRank::Last => 2,
        }
    }
}

/// One key of a dimension sort. Blank ticks always sort last.
pub enum SortKey {
    /// Ascending by the value of a variable.
    Var(String),
    /// By the position of the variable's value in the list; values not
    /// listed go last.
    VarOrder(String, Vec<Value>),
    /// By the position of the tick in the list; ticks not listed go last.
    Ticks(Vec<String>),
    /// Ascending by every variable of the expression, in order.
    AllVars,
    Rank(Box<dyn Fn(Option<&Instance>) -> SortRank>),
}

#[derive(Clone, Debug)]
pub struct Dim {
    id: u64,
    base: Option<u64>,
    expression: DimExpression,
    explicit: bool,
    instances: Vec<Option<Instance>>,
    indexes: HashMap<String, usize>,
}

fn build_indexes(
    expression: &DimExpression,
    instances: &[Option<Instance>],
) -> Result<HashMap<String, usize>> {
    let mut indexes = HashMap::with_capacity(instances.len());
    for (i, instance) in instances.iter().enumerate() {
        let Some(instance) = instance else {
            continue;
        };
        let tick = expression.translate(instance)?;
        if indexes.insert(tick.clone(), i).is_some() {
            return namespace_err!(RepeatedTick, format!("repeated tick {tick:?}"));
        }
    }
    Ok(indexes)
}

fn to_instance(expression: &DimExpression, tick: TickSpec) -> Result<Option<Instance>> {
    match tick {
        TickSpec::Blank => Ok(None),
        TickSpec::Text(text) => Ok(Some(expression.extract(&text)?)),
        TickSpec::Record(record) => {
            for var in expression.variables() {
                if !record.contains_key(var) {
                    return lookup_err!(
                        MissingVariable,
                        format!(
                            "variable {var:?} of {:?} missing in {record}",
                            expression.as_str()
                        )
                    );
                }
            }
            Ok(Some(record.project(expression.variables())))
        }
    }
}

impl Dim {
    pub fn new<T: Into<TickSpec>>(
        expression: Option<&str>,
        ticks: impl IntoIterator<Item = T>,
    ) -> Result<Dim> {
        match expression {
            Some(expr) => Dim::with_expression(DimExpression::new(expr)?, ticks),
            None => Dim::build(DimExpression::implicit(), false, ticks),
        }
    }

    pub fn with_expression<T: Into<TickSpec>>(
        expression: DimExpression,
        ticks: impl IntoIterator<Item = T>,
    ) -> Result<Dim> {
        Dim::build(expression, true, ticks)
    }

    fn build<T: Into<TickSpec>>(
        expression: DimExpression,
        explicit: bool,
        ticks: impl IntoIterator<Item = T>,
    ) -> Result<Dim> {
        let instances = ticks
            .into_iter()
            .map(|t| to_instance(&expression, t.into()))
            .collect::<Result<Vec<_>>>()?;
        Dim::from_instances(expression, explicit, instances)
    }

    pub(crate) fn from_instances(
        expression: DimExpression,
        explicit: bool,
        instances: Vec<Option<Instance>>,
    ) -> Result<Dim> {
        let indexes = build_indexes(&expression, &instances)?;
        Ok(Dim {
            id: next_id(),
            base: None,
            expression,
            explicit,
            instances,
            indexes,
        })
    }

    /// A dimension of `len` blank ticks and no expression.
    pub fn blank(len: usize) -> Dim {
        Dim {
            id: next_id(),
            base: None,
            expression: DimExpression::implicit(),
            explicit: false,
            instances: vec![None; len],
            indexes: HashMap::new(),
        }
    }

    /// A dimension of `len` blank ticks under the given expression.
    pub fn blank_with(expression: DimExpression, len: usize) -> Dim {
        Dim {
            explicit: true,
            expression,
            ..Dim::blank(len)
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn has_expression(&self) -> bool {
        self.explicit
    }

    /// The explicit expression, if any.
    pub fn expression(&self) -> Option<&str> {
        if self.explicit {
            Some(self.expression.as_str())
        } else {
            None
        }
    }

    /// The expression used for ticks, `@var@` when none was given.
    pub fn dim_expression(&self) -> &DimExpression {
        &self.expression
    }

    /// Variables of the explicit expression.
    pub fn variables(&self) -> &[String] {
        if self.explicit {
            self.expression.variables()
        } else {
            &[]
        }
    }

    pub(crate) fn effective_variables(&self) -> &[String] {
        self.expression.variables()
    }

    pub fn is_blank(&self) -> bool {
        self.instances.iter().all(|i| i.is_none())
    }

    pub fn is_view(&self) -> bool {
        self.base.is_some()
    }

    /// Whether both dimensions are (views of) the same base dimension.
    pub fn shares_base(&self, other: &Dim) -> bool {
        self.base.unwrap_or(self.id) == other.base.unwrap_or(other.id)
    }

    pub fn instances(&self) -> &[Option<Instance>] {
        &self.instances
    }

    pub fn instance(&self, i: usize) -> Option<&Instance> {
        self.instances.get(i).and_then(|i| i.as_ref())
    }

    pub fn ticks(&self) -> Vec<Option<String>> {
        (0..self.len()).map(|i| self.tick(i)).collect()
    }

    pub fn tick(&self, i: usize) -> Option<String> {
        self.instance(i)
            .and_then(|inst| self.expression.translate(inst).ok())
    }

    /// Ticks of the positions an index selects.
    pub fn ticks_at(&self, index: &Index) -> Result<Vec<Option<String>>> {
        Ok(self
            .positions(index)?
            .into_iter()
            .map(|p| self.tick(p))
            .collect())
    }

    pub fn extract(&self, tick: &str) -> Result<Instance> {
        self.expression.extract(tick)
    }

    pub fn translate(&self, instance: &Instance) -> Result<String> {
        self.expression.translate(instance)
    }

    /// Position of a tick; the tick is normalized through the expression
    /// so `"01"` finds the tick rendered as `"1"`.
    pub fn tick_position(&self, tick: &str) -> Option<usize> {
        if let Some(p) = self.indexes.get(tick) {
            return Some(*p);
        }
        let normalized = self
            .expression
            .extract(tick)
            .and_then(|inst| self.expression.translate(&inst))
            .ok()?;
        self.indexes.get(&normalized).copied()
    }

    pub fn contains(&self, tick: &str) -> bool {
        self.tick_position(tick).is_some()
    }

    pub fn contains_instance(&self, instance: &Instance) -> bool {
        self.expression
            .translate(instance)
            .is_ok_and(|tick| self.indexes.contains_key(&tick))
    }

    fn check_variable(&self, var: &str) -> Result<()> {
        if self.expression.has_variable(var) {
            Ok(())
        } else {
            lookup_err!(
                UnknownVariable,
                format!(
                    "variable {var:?} not in expression {:?}",
                    self.expression.as_str()
                )
            )
        }
    }

    /// Value of `var` for every tick.
    pub fn values(&self, var: &str) -> Result<Vec<Option<Value>>> {
        self.check_variable(var)?;
        Ok(self
            .instances
            .iter()
            .map(|i| i.as_ref().and_then(|i| i.get(var).cloned()))
            .collect())
    }

    /// Distinct values of `var`, in order of first appearance.
    pub fn unique_values(&self, var: &str) -> Result<Vec<Value>> {
        let mut out: Vec<Value> = Vec::new();
        for value in self.values(var)?.into_iter().flatten() {
            if !out.contains(&value) {
                out.push(value);
            }
        }
        Ok(out)
    }

    /// Distinct combinations of the given variables, in order of first
    /// appearance.
    pub fn unique_instances<S: AsRef<str>>(&self, vars: &[S]) -> Result<Vec<Instance>> {
        for var in vars {
            self.check_variable(var.as_ref())?;
        }
        let mut out: Vec<Instance> = Vec::new();
        for instance in self.instances.iter().flatten() {
            let projected = instance.project(vars);
            if !out.contains(&projected) {
                out.push(projected);
            }
        }
        Ok(out)
    }

    /// Positions of the non-blank ticks matching the filter; ticks lacking
    /// a referenced variable do not match.
    pub fn select(&self, filter: &Filter) -> Result<Vec<usize>> {
        let mut out = Vec::new();
        for (i, instance) in self.instances.iter().enumerate() {
            if let Some(instance) = instance {
                if filter.matches_lenient(instance)? {
                    out.push(i);
                }
            }
        }
        Ok(out)
    }

    fn single_match(&self, filter: &Filter) -> Result<usize> {
        let matches = self.select(filter)?;
        match matches.as_slice() {
            [p] => Ok(*p),
            [] => lookup_err!(FilterNoMatch, format!("filter has no matches: {filter}")),
            _ => lookup_err!(
                FilterMultipleMatch,
                format!("filter has multiple matches ({}): {filter}", matches.len())
            ),
        }
    }

    fn check_filter(&self, filter: &Filter, text: &str) -> Result<()> {
        match filter.first_unallowed(self.effective_variables()) {
            None => Ok(()),
            Some(var) if var == text.trim() => {
                lookup_err!(TickNotFound, format!("unknown tick {text:?}"))
            }
            Some(var) => lookup_err!(
                UnknownVariable,
                format!("unknown variable {var:?} in filter {text:?}")
            ),
        }
    }

    /// Resolves a tick name: tick lookup first, then a filter that must
    /// match exactly one tick.
    fn lookup_name(&self, name: &str) -> Result<usize> {
        if let Some(p) = self.tick_position(name) {
            return Ok(p);
        }
        let looks_like_tick = self.expression.extract(name).is_ok();
        let filter = match Filter::parse(name) {
            Ok(filter) => filter,
            Err(_) if looks_like_tick => {
                return lookup_err!(TickNotFound, format!("unknown tick {name:?}"));
            }
            Err(err) => {
                return Err(Error::new(
                    ErrorKind::Index,
                    ErrorCode::InvalidFilter,
                    Some(format!("invalid filter {name:?}: {err}")),
                ));
            }
        };
        if filter.variables().is_empty() && looks_like_tick {
            return lookup_err!(TickNotFound, format!("unknown tick {name:?}"));
        }
        self.check_filter(&filter, name)?;
        self.single_match(&filter)
    }

    fn wrap(&self, i: isize) -> Result<usize> {
        let len = self.len() as isize;
        let wrapped = if i < 0 { i + len } else { i };
        if wrapped < 0 || wrapped >= len {
            return index_err!(
                IndexOutOfRange,
                format!("index {i} is out of bounds for dimension with size {len}")
            );
        }
        Ok(wrapped as usize)
    }

    /// Resolves a single-tick reference to its position.
    pub fn position_of(&self, position: &Position) -> Result<usize> {
        match position {
            Position::At(i) => self.wrap(*i),
            Position::Tick(name) => self.lookup_name(name),
            Position::Instance(instance) => {
                if let Ok(tick) = self.expression.translate(instance) {
                    if let Some(p) = self.indexes.get(&tick) {
                        return Ok(*p);
                    }
                }
                let filter = Filter::from_instance(instance);
                self.check_filter(&filter, "")?;
                self.single_match(&filter)
            }
            Position::Filter(filter) => {
                self.check_filter(filter, "")?;
                self.single_match(filter)
            }
        }
    }

    /// Range bounds keep integer bounds raw so they can clamp.
    fn bound(&self, position: &Option<Position>) -> Result<Option<isize>> {
        match position {
            None => Ok(None),
            Some(Position::At(i)) => Ok(Some(*i)),
            Some(other) => Ok(Some(self.position_of(other)? as isize)),
        }
    }

    pub fn resolve(&self, index: &Index) -> Result<Resolved> {
        match index {
            Index::Scalar(i) => Ok(Resolved::Collapse(self.wrap(*i)?)),
            Index::TickName(name) => Ok(Resolved::Collapse(self.lookup_name(name)?)),
            Index::Instance(instance) => Ok(Resolved::Collapse(
                self.position_of(&Position::Instance(instance.clone()))?,
            )),
            Index::FilterExpr(filter) => {
                self.check_filter(filter, "")?;
                Ok(Resolved::Collapse(self.single_match(filter)?))
            }
            Index::Range(range) => {
                let start = self.bound(&range.start)?;
                let stop = self.bound(&range.stop)?;
                match &range.step {
                    None => Ok(Resolved::Range(slice_positions(start, stop, 1, self.len()))),
                    Some(Step::By(0)) => {
                        index_err!(ZeroStep, "slice step cannot be zero".to_string())
                    }
                    Some(Step::By(step)) => Ok(Resolved::Range(slice_positions(
                        start,
                        stop,
                        *step,
                        self.len(),
                    ))),
                    Some(Step::Filter(filter)) => {
                        if let Some(var) = filter.first_unallowed(self.effective_variables()) {
                            return index_err!(
                                InvalidSliceFilter,
                                format!("unknown variable {var:?} in slice filter {filter}")
                            );
                        }
                        let mut within = slice_positions(start, stop, 1, self.len());
                        let selected = self.select(filter)?;
                        within.retain(|p| selected.contains(p));
                        Ok(Resolved::Filtered(within))
                    }
                }
            }
            Index::List(positions) => Ok(Resolved::Advanced(
                positions
                    .iter()
                    .map(|p| self.position_of(p))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Index::Mask(mask) => {
                if mask.len() != self.len() {
                    return index_err!(
                        BadMask,
                        format!(
                            "boolean index of length {} for dimension of length {}",
                            mask.len(),
                            self.len()
                        )
                    );
                }
                Ok(Resolved::Advanced(
                    mask.iter()
                        .enumerate()
                        .filter(|(_, keep)| **keep)
                        .map(|(i, _)| i)
                        .collect(),
                ))
            }
            Index::FullMask(_) | Index::NewAxis | Index::Ellipsis => index_err!(
                Generic,
                format!("{index:?} cannot be resolved against a single dimension")
            ),
        }
    }

    /// Positions an index selects, in order.
    pub fn positions(&self, index: &Index) -> Result<Vec<usize>> {
        Ok(self.resolve(index)?.positions())
    }

    pub fn position(&self, index: &Index) -> Result<usize> {
        match self.resolve(index)? {
            Resolved::Collapse(p) => Ok(p),
            other => index_err!(
                Generic,
                format!(
                    "index selects {} positions, expected one",
                    other.positions().len()
                )
            ),
        }
    }

    /// The dimension of the selected ticks (none when the axis collapses),
    /// plus the resolved positions.
    pub fn view(&self, index: &Index) -> Result<(Option<Dim>, Resolved)> {
        let resolved = self.resolve(index)?;
        let dim = match &resolved {
            Resolved::Collapse(_) => None,
            Resolved::Range(ps) => Some(self.view_of(ps)),
            Resolved::Filtered(ps) | Resolved::Advanced(ps) => Some(self.take(ps)),
        };
        Ok((dim, resolved))
    }

    /// A view dimension over distinct positions.
    pub(crate) fn view_of(&self, positions: &[usize]) -> Dim {
        let instances: Vec<Option<Instance>> = positions
            .iter()
            .map(|p| self.instances[*p].clone())
            .collect();
        let mut indexes = HashMap::with_capacity(instances.len());
        for (i, instance) in instances.iter().enumerate() {
            if let Some(instance) = instance {
                if let Ok(tick) = self.expression.translate(instance) {
                    indexes.insert(tick, i);
                }
            }
        }
        Dim {
            id: next_id(),
            base: Some(self.base.unwrap_or(self.id)),
            expression: self.expression.clone(),
            explicit: self.explicit,
            instances,
            indexes,
        }
    }

    /// A detached copy of the given positions. Repeated ticks cannot be
    /// described, so such selections produce a blank dimension.
    pub fn take(&self, positions: &[usize]) -> Dim {
        let instances: Vec<Option<Instance>> = positions
            .iter()
            .map(|p| self.instances.get(*p).cloned().flatten())
            .collect();
        match Dim::from_instances(self.expression.clone(), self.explicit, instances) {
            Ok(dim) => dim,
            Err(err) => {
                debug!(%err, "selection repeats ticks; dropping dimension metadata");
                Dim::blank(positions.len())
            }
        }
    }

    /// A deep copy detached from any base dimension.
    pub fn copy(&self) -> Dim {
        Dim {
            id: next_id(),
            base: None,
            ..self.clone()
        }
    }

    /// Replaces the expression. An explicit expression can only be swapped
    /// for one with the same variables; removing it keeps each tick string
    /// under the implicit variable; adding one re-extracts every tick.
    pub fn set_expression(&mut self, expression: Option<&str>) -> Result<()> {
        let (expression, explicit, instances) = match expression {
            None => {
                let implicit = DimExpression::implicit();
                let instances = self
                    .ticks()
                    .into_iter()
                    .map(|t| t.map(|t| implicit.extract(&t)).transpose())
                    .collect::<Result<Vec<_>>>()?;
                (implicit, false, instances)
            }
            Some(text) => {
                let new = DimExpression::with_syntax(text, self.expression.syntax())?;
                if self.explicit {
                    let mut old_vars = self.expression.variables().to_vec();
                    let mut new_vars = new.variables().to_vec();
                    old_vars.sort();
                    new_vars.sort();
                    if old_vars != new_vars {
                        return namespace_err!(
                            ExpressionMismatch,
                            format!(
                                "expression {text:?} does not have the variables of {:?}",
                                self.expression.as_str()
                            )
                        );
                    }
                    (new, true, self.instances.clone())
                } else {
                    let instances = self
                        .ticks()
                        .into_iter()
                        .map(|t| t.map(|t| new.extract(&t)).transpose())
                        .collect::<Result<Vec<_>>>()?;
                    (new, true, instances)
                }
            }
        };
        self.indexes = build_indexes(&expression, &instances)?;
        self.expression = expression;
        self.explicit = explicit;
        self.instances = instances;
        Ok(())
    }

    /// Replaces the tick at position `i`.
    pub fn set_tick(&mut self, i: usize, tick: impl Into<TickSpec>) -> Result<()> {
        let i = self.wrap(i as isize)?;
        let instance = to_instance(&self.expression, tick.into())?;
        if let Some(instance) = &instance {
            let rendered = self.expression.translate(instance)?;
            if let Some(other) = self.indexes.get(&rendered) {
                if *other != i {
                    return namespace_err!(RepeatedTick, format!("repeated tick {rendered:?}"));
                }
            }
        }
        self.indexes.retain(|_, p| *p != i);
        if let Some(instance) = &instance {
            self.indexes.insert(self.expression.translate(instance)?, i);
        }
        self.instances[i] = instance;
        Ok(())
    }

    /// Sorts the ticks and returns the permutation applied (old positions
    /// in their new order).
    pub fn sort(&mut self, keys: &[SortKey]) -> Result<Vec<usize>> {
        let mut expanded: Vec<&SortKey> = Vec::new();
        let all_vars: Vec<SortKey> = self
            .effective_variables()
            .iter()
            .map(|v| SortKey::Var(v.clone()))
            .collect();
        for key in keys {
            match key {
                SortKey::AllVars => expanded.extend(all_vars.iter()),
                SortKey::Var(var) | SortKey::VarOrder(var, _) => {
                    self.check_variable(var)?;
                    expanded.push(key);
                }
                _ => expanded.push(key),
            }
        }
        if expanded.is_empty() {
            expanded.extend(all_vars.iter());
        }

        let ranks: Vec<Vec<SortRank>> = (0..self.len())
            .map(|i| {
                let instance = self.instance(i);
                expanded
                    .iter()
                    .map(|key| self.rank(key, i, instance))
                    .collect()
            })
            .collect();

        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            let blanks = self.instances[a]
                .is_none()
                .cmp(&self.instances[b].is_none());
            blanks.then_with(|| {
                ranks[a]
                    .iter()
                    .zip(ranks[b].iter())
                    .map(|(x, y)| x.cmp_rank(y))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
        });

        let instances: Vec<Option<Instance>> =
            order.iter().map(|p| self.instances[*p].clone()).collect();
        self.indexes = build_indexes(&self.expression, &instances)?;
        self.instances = instances;
        Ok(order)
    }

    fn rank(&self, key: &SortKey, i: usize, instance: Option<&Instance>) -> SortRank {
        match key {
            SortKey::Var(var) => match instance.and_then(|inst| inst.get(var)) {
                Some(v) => SortRank::Value(v.clone()),
                None => SortRank::Last,
            },
            SortKey::VarOrder(var, order) => instance
                .and_then(|inst| inst.get(var))
                .and_then(|v| order.iter().position(|o| o == v))
                .map(|p| SortRank::Value(Value::from(p)))
                .unwrap_or(SortRank::Last),
            SortKey::Ticks(ticks) => self
                .tick(i)
                .and_then(|t| ticks.iter().position(|o| *o == t))
                .map(|p| SortRank::Value(Value::from(p)))
                .unwrap_or(SortRank::Last),
            SortKey::AllVars => SortRank::First,
            SortKey::Rank(f) => f(instance),
        }
    }

    /// Concatenation of several dimensions sharing one expression.
    pub fn concat(dims: &[&Dim]) -> Result<Dim> {
        let Some(first) = dims.first() else {
            return Ok(Dim::blank(0));
        };
        for dim in dims.iter().skip(1) {
            if dim.expression() != first.expression() {
                return namespace_err!(
                    ExpressionMismatch,
                    format!(
                        "cannot concatenate dimensions with expressions {:?} and {:?}",
                        first.expression(),
                        dim.expression()
                    )
                );
            }
        }
        let instances = dims
            .iter()
            .flat_map(|d| d.instances.iter().cloned())
            .collect();
        Dim::from_instances(first.expression.clone(), first.explicit, instances)
    }

    /// The dimension of the flattened product of several axes, in C
    /// (last axis fastest) or Fortran (first axis fastest) order. Axes
    /// without an expression or sharing variables yield a blank result.
    pub fn flatten(dims: &[&Dim], fortran: bool) -> Dim {
        let len: usize = dims.iter().map(|d| d.len()).product();
        if dims.len() == 1 {
            return dims[0].copy();
        }
        let mut seen: Vec<&str> = Vec::new();
        for dim in dims {
            if !dim.explicit {
                debug!("flattening an axis without expression; dropping metadata");
                return Dim::blank(len);
            }
            for var in dim.variables() {
                if seen.contains(&var.as_str()) {
                    debug!(var = %var, "flattened axes share a variable; dropping metadata");
                    return Dim::blank(len);
                }
                seen.push(var);
            }
        }
        let exprs: Vec<&DimExpression> = dims.iter().map(|d| &d.expression).collect();
        let expression = match DimExpression::join(&exprs) {
            Ok(e) => e,
            Err(_) => return Dim::blank(len),
        };

        let mut instances = Vec::with_capacity(len);
        let mut counter = vec![0usize; dims.len()];
        for _ in 0..len {
            let mut merged = Some(Instance::new());
            for (axis, dim) in dims.iter().enumerate() {
                merged = match (merged, &dim.instances[counter[axis]]) {
                    (Some(acc), Some(inst)) => Some(acc.merge(inst)),
                    _ => None,
                };
            }
            instances.push(merged);
            // advance the odometer
            let order: Vec<usize> = if fortran {
                (0..dims.len()).collect()
            } else {
                (0..dims.len()).rev().collect()
            };
            for axis in order {
                counter[axis] += 1;
                if counter[axis] < dims[axis].len() {
                    break;
                }
                counter[axis] = 0;
            }
        }
        match Dim::from_instances(expression, true, instances) {
            Ok(dim) => dim,
            Err(err) => {
                debug!(%err, "flattened ticks collide; dropping metadata");
                Dim::blank(len)
            }
        }
    }
}

impl PartialEq for Dim {
    fn eq(&self, other: &Dim) -> bool {
        self.expression() == other.expression()
            && self.len() == other.len()
            && self.ticks() == other.ticks()
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.expression() {
            Some(expr) => write!(f, "Dim('{expr}', [")?,
            None => write!(f, "Dim(None, [")?,
        }
        for (i, tick) in self.ticks().into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match tick {
                Some(tick) => write!(f, "'{tick}'")?,
                None => write!(f, "None")?,
            }
        }
        write!(f, "])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Range;

    fn abc() -> Dim {
        Dim::new(Some("@a@-@b@"), ["1-1", "1-2", "1-3", "2-1", "2-2"]).unwrap()
    }

    #[test]
    fn test_construction() {
        let d = abc();
        assert_eq!(5, d.len());
        assert_eq!(Some("@a@-@b@"), d.expression());
        assert_eq!(vec!["a", "b"], d.variables());
        assert_eq!(Some("1-3".to_string()), d.tick(2));
        assert_eq!(Some(&Value::Int(2)), d.instance(3).unwrap().get("a"));

        let err = Dim::new(Some("@a@"), ["1", "2", "1"]).unwrap_err();
        assert_eq!(ErrorCode::RepeatedTick, err.code);

        let err = Dim::new(Some("@a@-@b@"), [Instance::from([("a", 1)])]).unwrap_err();
        assert_eq!(ErrorCode::MissingVariable, err.code);

        let d = Dim::new(None, ["x", "y"]).unwrap();
        assert_eq!(None, d.expression());
        assert!(d.variables().is_empty());
        assert_eq!(Some("y".to_string()), d.tick(1));
    }

    #[test]
    fn test_blank_and_records() {
        let d = Dim::new(Some("@a@"), [None, Some("3")]).unwrap();
        assert_eq!(vec![None, Some("3".to_string())], d.ticks());
        let d = Dim::new(
            Some("@a@"),
            [Instance::from([("a", Value::Int(1)), ("z", Value::Int(9))])],
        )
        .unwrap();
        assert!(!d.instance(0).unwrap().contains_key("z"));
        assert!(Dim::blank(3).is_blank());
    }

    #[test]
    fn test_lookup_by_tick_and_filter() {
        let d = abc();
        assert_eq!(3, d.position(&Index::from("2-1")).unwrap());
        assert_eq!(3, d.position(&Index::from("02-01")).unwrap());
        assert_eq!(4, d.position(&Index::from("a == 2 && b == 2")).unwrap());
        assert_eq!(
            2,
            d.position(&Index::from(Instance::from([("a", 1), ("b", 3)])))
                .unwrap()
        );

        let code = |s: &str| d.position(&Index::from(s)).unwrap_err().code;
        assert_eq!(ErrorCode::FilterMultipleMatch, code("a == 1"));
        assert_eq!(ErrorCode::FilterNoMatch, code("a == 5"));
        assert_eq!(ErrorCode::UnknownVariable, code("c == 1"));
        assert_eq!(ErrorCode::TickNotFound, code("c"));
        assert_eq!(ErrorCode::TickNotFound, code("3-3"));
        assert_eq!(ErrorCode::InvalidFilter, code("a ="));
    }

    #[test]
    fn test_integer_index() {
        let d = abc();
        assert_eq!(4, d.position(&Index::from(-1)).unwrap());
        let err = d.position(&Index::from(5)).unwrap_err();
        assert_eq!(ErrorCode::IndexOutOfRange, err.code);
    }

    #[test]
    fn test_ranges() {
        let d = abc();
        assert_eq!(vec![1, 2], d.positions(&Index::from("1-2".."2-1")).unwrap());
        assert_eq!(vec![3, 4], d.positions(&Index::from("2-1"..)).unwrap());
        assert_eq!(
            vec![4, 2, 0],
            d.positions(&Index::Range(Range::full().step(-2))).unwrap()
        );
        assert_eq!(
            vec![1, 4],
            d.positions(&Index::filter("b == 2").unwrap()).unwrap()
        );
        let within = Index::Range(
            Range::new(Some(Position::At(2)), None)
                .filter("b == 2")
                .unwrap(),
        );
        assert_eq!(vec![4], d.positions(&within).unwrap());
        let err = d.positions(&Index::filter("zz == 2").unwrap()).unwrap_err();
        assert_eq!(ErrorCode::InvalidSliceFilter, err.code);
        let err = d
            .positions(&Index::Range(Range::full().step(0)))
            .unwrap_err();
        assert_eq!(ErrorCode::ZeroStep, err.code);
    }

    #[test]
    fn test_view_and_copy() {
        let d = abc();
        let (view, resolved) = d.view(&Index::from(1..3)).unwrap();
        let view = view.unwrap();
        assert_eq!(Resolved::Range(vec![1, 2]), resolved);
        assert!(view.is_view());
        assert!(view.shares_base(&d));
        assert_eq!(Some(0), view.tick_position("1-2"));

        let (selected, resolved) = d.view(&Index::from(vec![0, 3])).unwrap();
        assert_eq!(Resolved::Advanced(vec![0, 3]), resolved);
        let selected = selected.unwrap();
        assert!(!selected.is_view());
        assert_eq!(
            vec![Some("1-1".to_string()), Some("2-1".to_string())],
            selected.ticks()
        );

        let (none, _) = d.view(&Index::from(0)).unwrap();
        assert!(none.is_none());

        let repeated = d.take(&[0, 0]);
        assert!(repeated.is_blank());
        assert_eq!(2, repeated.len());

        let copy = view.copy();
        assert!(!copy.is_view());
        assert_eq!(view, copy);
    }

    #[test]
    fn test_values() {
        let d = abc();
        assert_eq!(
            vec![Value::Int(1), Value::Int(2)],
            d.unique_values("a").unwrap()
        );
        assert_eq!(Some(Value::Int(3)), d.values("b").unwrap()[2].clone());
        assert_eq!(ErrorCode::UnknownVariable, d.values("zz").unwrap_err().code);
        assert_eq!(2, d.unique_instances(&["a"]).unwrap().len());
        assert!(d.contains("1-3"));
        assert!(!d.contains("3-1"));
    }

    #[test]
    fn test_sort() {
        let mut d = Dim::new(Some("@a@-@b@"), ["2-1", "1-2", "1-1"]).unwrap();
        let perm = d.sort(&[SortKey::AllVars]).unwrap();
        assert_eq!(vec![2, 1, 0], perm);
        assert_eq!(Some("1-1".to_string()), d.tick(0));
        assert_eq!(Some(2), d.tick_position("2-1"));

        let perm = d
            .sort(&[SortKey::VarOrder("a".to_string(), vec![Value::Int(2)])])
            .unwrap();
        assert_eq!(vec![2, 0, 1], perm);

        let perm = d.sort(&[SortKey::Ticks(vec!["1-2".to_string()])]).unwrap();
        assert_eq!(Some("1-2".to_string()), d.tick(0));
        assert_eq!(3, perm.len());

        let mut d = Dim::new(Some("@a@"), [Some("3"), None, Some("1")]).unwrap();
        d.sort(&[SortKey::Rank(Box::new(|i: Option<&Instance>| match i {
            Some(i) => SortRank::Value(i.get("a").unwrap().neg().unwrap()),
            None => SortRank::First,
        }))])
        .unwrap();
        assert_eq!(
            vec![Some("3".to_string()), Some("1".to_string()), None],
            d.ticks()
        );

        let err = d.sort(&[SortKey::Var("zz".to_string())]).unwrap_err();
        assert_eq!(ErrorCode::UnknownVariable, err.code);
    }

    #[test]
    fn test_set_expression() {
        let mut d = abc();
        d.set_expression(Some("@b@_@a@")).unwrap();
        assert_eq!(Some("2_1".to_string()), d.tick(1));
        let err = d.set_expression(Some("@a@")).unwrap_err();
        assert_eq!(ErrorCode::ExpressionMismatch, err.code);

        let mut d = Dim::new(None, ["x1", "x2"]).unwrap();
        d.set_expression(Some("x@n@")).unwrap();
        assert_eq!(Some(&Value::Int(2)), d.instance(1).unwrap().get("n"));
        d.set_expression(None).unwrap();
        assert_eq!(None, d.expression());
        assert_eq!(Some("x2".to_string()), d.tick(1));
    }

    #[test]
    fn test_set_tick() {
        let mut d = abc();
        d.set_tick(0, "3-3").unwrap();
        assert!(d.contains("3-3"));
        assert!(!d.contains("1-1"));
        let err = d.set_tick(1, "2-2").unwrap_err();
        assert_eq!(ErrorCode::RepeatedTick, err.code);
        d.set_tick(1, TickSpec::Blank).unwrap();
        assert_eq!(None, d.tick(1));
    }

    #[test]
    fn test_concat_and_flatten() {
        let a = Dim::new(Some("@a@"), ["1", "2"]).unwrap();
        let b = Dim::new(Some("@a@"), ["3"]).unwrap();
        let c = Dim::concat(&[&a, &b]).unwrap();
        assert_eq!(3, c.len());
        assert_eq!(
            ErrorCode::RepeatedTick,
            Dim::concat(&[&a, &a]).unwrap_err().code
        );

        let x = Dim::new(Some("x@x@"), ["x0", "x1", "x2"]).unwrap();
        let flat = Dim::flatten(&[&a, &x], false);
        assert_eq!(Some("@a@-x@x@"), flat.expression());
        assert_eq!(Some("1-x1".to_string()), flat.tick(1));
        assert_eq!(Some("2-x0".to_string()), flat.tick(3));
        let flat = Dim::flatten(&[&a, &x], true);
        assert_eq!(Some("2-x0".to_string()), flat.tick(1));
        assert!(Dim::flatten(&[&a, &a], false).is_blank());
    }

    #[test]
    fn test_display() {
        let d = Dim::new(Some("@a@"), [Some("1"), None]).unwrap();
        assert_eq!("Dim('@a@', ['1', None])", d.to_string());
        assert_eq!("Dim(None, [None, None])", Dim::blank(2).to_string());
    }
}
