//! Backend-neutral linear program.
//!
//! The model builder writes into a `LinearProgram`; a solver adapter
//! translates it into its own API.

use serde::{Deserialize, Serialize};

/// Index of a decision variable in its `LinearProgram`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarBounds {
    pub lower: f64,
    pub upper: f64,
}

impl VarBounds {
    pub fn unit() -> Self {
        Self { lower: 0.0, upper: 1.0 }
    }
}

/// Sparse linear form `Σ coef·var`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self { terms: Vec::with_capacity(n) }
    }

    pub fn term(mut self, var: VarId, coef: f64) -> Self {
        self.terms.push((var, coef));
        self
    }

    pub fn add_term(&mut self, var: VarId, coef: f64) {
        self.terms.push((var, coef));
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value of the form under an assignment indexed by `VarId`
    pub fn eval(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(v, c)| c * values.get(v.0).copied().unwrap_or(0.0))
            .sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Le,
    Ge,
    Eq,
}

/// What a constraint encodes; used for diagnostics and tests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// `z[e,c] >= y[s,c]`
    EntityCoversState,
    /// `y = 1` for a state before the intervention time
    EarlySeed,
    /// `y = 1` for a DAG source
    Source,
    /// `y[t] >= y[s] - x[group(t)]`
    Transmission,
    /// `y <= 1 - x[group]`
    Blocking,
    /// `Σ x <= B`
    Budget,
    /// `x[-1] = 0`
    SentinelZero,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearConstraint {
    pub kind: ConstraintKind,
    pub expr: LinearExpr,
    pub cmp: Comparison,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn satisfied_by(&self, values: &[f64], tol: f64) -> bool {
        let lhs = self.expr.eval(values);
        match self.cmp {
            Comparison::Le => lhs <= self.rhs + tol,
            Comparison::Ge => lhs >= self.rhs - tol,
            Comparison::Eq => (lhs - self.rhs).abs() <= tol,
        }
    }
}

/// Minimization problem over bounded continuous variables
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LinearProgram {
    variables: Vec<VarBounds>,
    constraints: Vec<LinearConstraint>,
    objective: LinearExpr,
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, bounds: VarBounds) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(bounds);
        id
    }

    pub fn add_constraint(&mut self, kind: ConstraintKind, expr: LinearExpr, cmp: Comparison, rhs: f64) {
        self.constraints.push(LinearConstraint { kind, expr, cmp, rhs });
    }

    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    pub fn variables(&self) -> &[VarBounds] {
        &self.variables
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Nonzero coefficients in the constraint matrix
    pub fn nonzeros(&self) -> usize {
        self.constraints.iter().map(|c| c.expr.len()).sum()
    }

    pub fn count_kind(&self, kind: ConstraintKind) -> usize {
        self.constraints.iter().filter(|c| c.kind == kind).count()
    }

    /// Constraints violated by `values` beyond `tol`
    pub fn violations(&self, values: &[f64], tol: f64) -> Vec<&LinearConstraint> {
        self.constraints
            .iter()
            .filter(|c| !c.satisfied_by(values, tol))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_and_violations() {
        let mut lp = LinearProgram::new();
        let a = lp.add_variable(VarBounds::unit());
        let b = lp.add_variable(VarBounds::unit());
        lp.add_constraint(
            ConstraintKind::Budget,
            LinearExpr::new().term(a, 1.0).term(b, 1.0),
            Comparison::Le,
            1.0,
        );
        lp.add_constraint(
            ConstraintKind::Transmission,
            LinearExpr::new().term(b, 1.0).term(a, -1.0),
            Comparison::Ge,
            0.0,
        );

        assert_eq!(lp.nonzeros(), 4);
        assert!(lp.violations(&[0.5, 0.5], 1e-9).is_empty());
        let bad = lp.violations(&[1.0, 0.5], 1e-9);
        assert_eq!(bad.len(), 2);
        assert_eq!(lp.count_kind(ConstraintKind::Budget), 1);
    }
}
