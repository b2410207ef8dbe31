use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::Question;
use crate::store::QuestionPartitions;

/// Outcome of a question draw. Shortfalls record how many questions each
/// bank was short of the requested count.
#[derive(Debug, Clone)]
pub struct Selection {
    pub questions: Vec<Question>,
    pub fixed_shortfall: u32,
    pub pool_shortfall: u32,
}

impl Selection {
    pub fn has_shortfall(&self) -> bool {
        self.fixed_shortfall > 0 || self.pool_shortfall > 0
    }
}

/// Draws `fixed_count` questions from the fixed bank and `pool_count` from
/// the pool bank, each uniformly without replacement, then shuffles the
/// combined paper so fixed and pool questions interleave.
pub fn select_questions(
    partitions: QuestionPartitions,
    fixed_count: u32,
    pool_count: u32,
) -> Selection {
    select_questions_with_rng(&mut rand::rng(), partitions, fixed_count, pool_count)
}

pub fn select_questions_with_rng<R: Rng + ?Sized>(
    rng: &mut R,
    partitions: QuestionPartitions,
    fixed_count: u32,
    pool_count: u32,
) -> Selection {
    let QuestionPartitions { mut fixed, mut pool } = partitions;

    fixed.shuffle(rng);
    pool.shuffle(rng);

    let fixed_take = (fixed_count as usize).min(fixed.len());
    let pool_take = (pool_count as usize).min(pool.len());
    let fixed_shortfall = fixed_count - fixed_take as u32;
    let pool_shortfall = pool_count - pool_take as u32;

    if fixed_shortfall > 0 || pool_shortfall > 0 {
        tracing::warn!(
            "Question banks smaller than requested draw: fixed {}/{}, pool {}/{}",
            fixed_take,
            fixed_count,
            pool_take,
            pool_count
        );
    }

    fixed.truncate(fixed_take);
    pool.truncate(pool_take);

    let mut questions = fixed;
    questions.append(&mut pool);
    questions.shuffle(rng);

    Selection {
        questions,
        fixed_shortfall,
        pool_shortfall,
    }
}
