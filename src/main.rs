#![allow(non_snake_case)]
use RustedBlocks::Utils::config::BlockConfig;
use RustedBlocks::block::{
    Action, BlockBC, BlockError, BlockMat, BlockResult, BlockVec, FixedEntries, Operand,
};
use RustedBlocks::somelinalg::backend_traits::BackendVector;
use RustedBlocks::somelinalg::explicit_ops::{InvDiag, LumpedInvDiag};
use log::{error, info};
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use sprs::{CsMat, TriMat};
use std::env;

/// 1D finite-difference Laplacian, n x n
fn laplacian(n: usize) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(n, n);
    for i in 0..n {
        coo.push(i, i, 2.0);
        if i > 0 {
            coo.push(i, i - 1, -1.0);
            coo.push(i - 1, i, -1.0);
        }
    }
    CsrMatrix::from(&coo)
}

/// forward differences, (n-1) x n
fn divergence(n: usize) -> CsMat<f64> {
    let mut tri = TriMat::new((n - 1, n));
    for i in 0..n - 1 {
        tri.add_triplet(i, i, -1.0);
        tri.add_triplet(i, i + 1, 1.0);
    }
    tri.to_csr()
}

fn applied(action: Action<Operand>, what: &str) -> BlockResult<Operand> {
    match action {
        Action::Applied(y) => Ok(y),
        Action::NotApplicable => Err(BlockError::UnsupportedOperand(format!(
            "{} has no action on the given vector",
            what
        ))),
    }
}

/// Stokes-like saddle point [[A, B^T], [B, 0]] with a block diagonal preconditioner
/// built from InvDiag(A) and the lumped inverse of the collapsed Schur complement B A_d^-1 B^T.
fn saddle_point(config: &BlockConfig, n: usize) -> BlockResult<()> {
    let a = laplacian(n);
    let b = divergence(n);
    let bt = b.transpose_view().to_owned();
    let mut m = BlockMat::from_rows(vec![
        vec![Operand::op(a.clone()), Operand::op(bt.clone())],
        vec![Operand::op(b.clone()), Operand::Scalar(0.0)],
    ])?;
    config.configure(&mut m);
    info!("system\n{}", m.layout_table());

    let a_inv = InvDiag(&a)?;
    let schur = config
        .collapse(&(Operand::op(b.clone()) * Operand::op(a_inv.clone()) * Operand::op(bt)))?
        .into_explicit(n - 1);
    info!("Schur complement approximation {}", schur);
    let s_inv = LumpedInvDiag(&schur)?;
    let mut prec = BlockMat::from_rows(vec![
        vec![Operand::op(a_inv), Operand::Empty],
        vec![Operand::Empty, Operand::op(s_inv)],
    ])?;
    config.configure(&mut prec);
    info!("preconditioner\n{}", prec.layout_table());

    let mut x = m.create_vec(1)?;
    FixedEntries::new()
        .fix(0, n / 2, 1.0)
        .fix(1, 0, -1.0)
        .apply(&mut x)?;
    let x = Operand::from(x);
    let m = Operand::from(m);
    let prec = Operand::from(prec);

    let mx = applied(m.apply(&x)?, "M")?;
    let pmx = applied((prec.clone() * m.clone()).apply(&x)?, "P * M")?;
    let mtx = applied(m.t().apply(&x)?, "M^T")?;
    // symmetric system: M x and M^T x agree
    let mut diff = mx.as_block_vec().cloned().unwrap_or_else(|| BlockVec::new(2));
    if let Some(mtx) = mtx.as_block_vec() {
        diff.sub_in_place(mtx)?;
    }
    info!("|M x| = {:.6}", mx.to_DVector()?.norm());
    info!("|P M x| = {:.6}", pmx.to_DVector()?.norm());
    info!("|M x - M^T x| = {:.3e}", diff.norm()?);

    let shifted = m.clone() - 0.5 * prec;
    let r = applied(shifted.apply(&x)?, "M - 0.5 P")?;
    info!("{} applied, |r| = {:.6}", shifted, r.to_DVector()?.norm());
    Ok(())
}

/// the same engine over faer storage
fn faer_blocks() -> BlockResult<()> {
    let a = faer::mat![[4.0, 1.0], [1.0, 3.0]];
    let m = BlockMat::from_rows(vec![
        vec![Operand::op(a.clone()), Operand::Scalar(1.0)],
        vec![Operand::Scalar(1.0), Operand::op(a)],
    ])?;
    let mut x0 = faer::Col::<f64>::zeros(2);
    BackendVector::fill(&mut x0, 1.0);
    let x1 = faer::Col::<f64>::zeros(2);
    let x = BlockVec::from_vec(vec![Operand::vec(x0), Operand::vec(x1)]);
    let y = applied(Operand::from(m).apply(&Operand::from(x))?, "faer block matrix")?;
    let values: DVector<f64> = y.to_DVector()?;
    info!("faer block product {:?}", values.as_slice());
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => match BlockConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                return;
            }
        },
        None => BlockConfig::default(),
    };
    config.init_logging();

    let example = 0;
    let result = match example {
        0 => saddle_point(&config, 8).and_then(|_| faer_blocks()),
        1 => saddle_point(&config, 8),
        2 => faer_blocks(),
        _ => Ok(()),
    };
    if let Err(e) = result {
        error!("{}", e);
    }
}
