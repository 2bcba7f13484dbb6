//! Lazy expression tree.
//!
//! `*` between operands builds a [`BlockExpr::Compose`] chain, `+`/`-` build binary
//! [`BlockExpr::Add`]/[`BlockExpr::Sub`] nodes, `.t()` a [`BlockExpr::Transpose`].
//! Nothing is computed until `apply`/`transpmult` meets a vector.
//!
//! Chains are stored in application order: `chain[0]` acts first. Composing two
//! chains concatenates them, so a chain never holds another chain. Sums and
//! differences never join a chain: `(A + B) * C` keeps `A + B` as one factor.
use crate::block::block_error::{Action, BlockResult};
use crate::block::operand::{Operand, accumulate, scalar_mult};
use log::debug;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum BlockExpr {
    /// product, factors in application order
    Compose(Vec<Operand>),
    Add(Operand, Operand),
    Sub(Operand, Operand),
    Transpose(Operand),
}

fn flatten(x: Operand) -> Vec<Operand> {
    if let Operand::Node(e) = &x {
        if let BlockExpr::Compose(chain) = &**e {
            return chain.clone();
        }
    }
    vec![x]
}

impl BlockExpr {
    /// A * B: B acts first
    pub fn compose(a: Operand, b: Operand) -> BlockExpr {
        let mut chain = flatten(b);
        chain.extend(flatten(a));
        BlockExpr::Compose(chain)
    }

    pub fn chain(&self) -> Option<&[Operand]> {
        match self {
            BlockExpr::Compose(chain) => Some(chain),
            _ => None,
        }
    }

    pub fn apply(&self, x: &Operand) -> BlockResult<Action<Operand>> {
        match self {
            BlockExpr::Compose(chain) => {
                let mut current = x.clone();
                for factor in chain {
                    if factor.is_identity() {
                        continue;
                    }
                    match factor.apply(&current)? {
                        Action::Applied(y) => current = y,
                        Action::NotApplicable => {
                            debug!("{} not applicable to {} in {}", factor, current, self);
                            return Ok(Action::NotApplicable);
                        }
                    }
                }
                Ok(Action::Applied(current))
            }
            BlockExpr::Add(a, b) => additive(a, b, 1.0, x, false),
            BlockExpr::Sub(a, b) => additive(a, b, -1.0, x, false),
            BlockExpr::Transpose(a) => a.transpmult(x),
        }
    }

    pub fn transpmult(&self, x: &Operand) -> BlockResult<Action<Operand>> {
        match self {
            BlockExpr::Compose(chain) => {
                let mut current = x.clone();
                for factor in chain.iter().rev() {
                    let step = match factor {
                        Operand::Scalar(s) if *s == 1.0 => continue,
                        Operand::Scalar(s) => scalar_mult(*s, &current)?,
                        _ => factor.transpmult(&current)?,
                    };
                    match step {
                        Action::Applied(y) => current = y,
                        Action::NotApplicable => {
                            debug!("{}^T not applicable to {} in {}", factor, current, self);
                            return Ok(Action::NotApplicable);
                        }
                    }
                }
                Ok(Action::Applied(current))
            }
            BlockExpr::Add(a, b) => additive(a, b, 1.0, x, true),
            BlockExpr::Sub(a, b) => additive(a, b, -1.0, x, true),
            BlockExpr::Transpose(a) => a.apply(x),
        }
    }
}

/// y = A x + sign * B x. Only vectors are accepted; both terms are evaluated before
/// the sum is formed, so a NotApplicable term leaves nothing half-written.
fn additive(
    a: &Operand,
    b: &Operand,
    sign: f64,
    x: &Operand,
    adjoint: bool,
) -> BlockResult<Action<Operand>> {
    if !x.is_vector_like() {
        return Ok(Action::NotApplicable);
    }
    let (ax, bx) = if adjoint {
        (a.transpmult(x)?, b.transpmult(x)?)
    } else {
        (a.apply(x)?, b.apply(x)?)
    };
    let (Action::Applied(mut y), Action::Applied(z)) = (ax, bx) else {
        return Ok(Action::NotApplicable);
    };
    let context = if sign < 0.0 { "difference" } else { "sum" };
    accumulate(&mut y, &z, sign, context)?;
    Ok(Action::Applied(y))
}

impl fmt::Display for BlockExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockExpr::Compose(chain) => {
                let parts: Vec<String> = chain.iter().rev().map(|op| op.to_string()).collect();
                write!(f, "{{{}}}", parts.join(" * "))
            }
            BlockExpr::Add(a, b) => write!(f, "{{{} + {}}}", a, b),
            BlockExpr::Sub(a, b) => write!(f, "{{{} - {}}}", a, b),
            BlockExpr::Transpose(a) => write!(f, "{{{}}}^T", a),
        }
    }
}

////////////////////////////////////////////////////////////////
//  OPERATORS: build trees, never evaluate
////////////////////////////////////////////////////////////////
impl Mul for Operand {
    type Output = Operand;
    fn mul(self, rhs: Operand) -> Operand {
        if let (Operand::Scalar(a), Operand::Scalar(b)) = (&self, &rhs) {
            return Operand::Scalar(a * b);
        }
        Operand::Node(Rc::new(BlockExpr::compose(self, rhs)))
    }
}

impl Mul<f64> for Operand {
    type Output = Operand;
    fn mul(self, rhs: f64) -> Operand {
        self * Operand::Scalar(rhs)
    }
}

impl Mul<Operand> for f64 {
    type Output = Operand;
    fn mul(self, rhs: Operand) -> Operand {
        Operand::Scalar(self) * rhs
    }
}

impl Add for Operand {
    type Output = Operand;
    fn add(self, rhs: Operand) -> Operand {
        Operand::Node(Rc::new(BlockExpr::Add(self, rhs)))
    }
}

impl Sub for Operand {
    type Output = Operand;
    fn sub(self, rhs: Operand) -> Operand {
        Operand::Node(Rc::new(BlockExpr::Sub(self, rhs)))
    }
}

impl Neg for Operand {
    type Output = Operand;
    fn neg(self) -> Operand {
        if let Operand::Scalar(s) = self {
            return Operand::Scalar(-s);
        }
        // -(A - B) = B - A, anything else gets a -1 factor
        if let Operand::Node(e) = &self {
            if let BlockExpr::Sub(a, b) = &**e {
                return Operand::Node(Rc::new(BlockExpr::Sub(b.clone(), a.clone())));
            }
        }
        Operand::Scalar(-1.0) * self
    }
}
