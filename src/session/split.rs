use super::{LoadError, Result, SessionMap};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// How sessions are assigned to train and test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Order-preserving prefix split: earliest sessions train, latest test
    #[default]
    Sequential,
    /// Seeded shuffle before splitting
    Random,
}

impl Partition {
    pub fn from_sequential(sequential: bool) -> Self {
        if sequential {
            Partition::Sequential
        } else {
            Partition::Random
        }
    }
}

/// Sequential split: the first `floor((1 - r) * n)` sessions train
fn sequential_train_size(n: usize, test_ratio: f64) -> usize {
    (((1.0 - test_ratio) * n as f64).floor() as usize).min(n)
}

/// Random split: `round(r * n)` shuffled sessions test
fn random_test_size(n: usize, test_ratio: f64) -> usize {
    ((test_ratio * n as f64).round() as usize).min(n)
}

fn check_sizes(n: usize, n_train: usize, test_ratio: f64) -> Result<()> {
    if n == 0 {
        return Ok(());
    }
    let side = if n_train == 0 {
        "train"
    } else if n_train == n {
        "test"
    } else {
        return Ok(());
    };
    Err(LoadError::EmptySplit {
        sessions: n,
        test_ratio,
        side,
    })
}

/// Partition sessions into disjoint train and test maps
///
/// - [`Partition::Sequential`]: the first `floor((1 - r)·n)` sessions in
///   input order are train, the rest test. The seed is ignored.
/// - [`Partition::Random`]: sessions are shuffled with a generator seeded from
///   `random_seed`; the first `round(r·n)` shuffled sessions are test. Both
///   halves keep the shuffled order.
///
/// The union of the two key sets always equals the input key set. A
/// non-empty input whose ratio would leave either half empty is rejected
/// with [`LoadError::EmptySplit`].
///
/// # Example
/// ```
/// use bitacora::session::{split_sessions, Partition, Session, SessionMap};
///
/// let sessions: SessionMap = ["s1", "s2", "s3", "s4"].into_iter().map(Session::new).collect();
/// let (train, test) = split_sessions(sessions, 0.5, Partition::Sequential, 42).unwrap();
/// assert_eq!(train.keys().collect::<Vec<_>>(), vec!["s1", "s2"]);
/// assert_eq!(test.keys().collect::<Vec<_>>(), vec!["s3", "s4"]);
/// ```
pub fn split_sessions(
    sessions: SessionMap,
    test_ratio: f64,
    partition: Partition,
    random_seed: u64,
) -> Result<(SessionMap, SessionMap)> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(LoadError::InvalidRatio(test_ratio));
    }

    let mut ordered = sessions.into_sessions();
    let n = ordered.len();

    match partition {
        Partition::Sequential => {
            let n_train = sequential_train_size(n, test_ratio);
            check_sizes(n, n_train, test_ratio)?;
            let test = ordered.split_off(n_train);
            Ok((ordered.into_iter().collect(), test.into_iter().collect()))
        }
        Partition::Random => {
            let n_test = random_test_size(n, test_ratio);
            check_sizes(n, n - n_test, test_ratio)?;
            let mut rng = StdRng::seed_from_u64(random_seed);
            ordered.shuffle(&mut rng);
            let train = ordered.split_off(n_test);
            Ok((train.into_iter().collect(), ordered.into_iter().collect()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    fn sessions(n: usize) -> SessionMap {
        (0..n).map(|i| Session::new(format!("s{}", i))).collect()
    }

    #[test]
    fn test_split_sizes() {
        assert_eq!(sequential_train_size(4, 0.5), 2);
        assert_eq!(sequential_train_size(10, 0.3), 7);
        assert_eq!(sequential_train_size(3, 0.34), 1);
        assert_eq!(random_test_size(10, 0.25), 3); // 2.5 rounds away from zero
        assert_eq!(random_test_size(0, 0.5), 0);
    }

    #[test]
    fn test_sequential_floors_the_train_share() {
        let (train, test) = split_sessions(sessions(3), 0.34, Partition::Sequential, 0).unwrap();
        assert_eq!(train.keys().collect::<Vec<_>>(), vec!["s0"]);
        assert_eq!(test.keys().collect::<Vec<_>>(), vec!["s1", "s2"]);

        // floor(0.9 * 4) = 3, so a small ratio still yields one test session
        let (train, test) = split_sessions(sessions(4), 0.1, Partition::Sequential, 0).unwrap();
        assert_eq!((train.len(), test.len()), (3, 1));
    }

    #[test]
    fn test_single_session_cannot_be_split() {
        let err = split_sessions(sessions(1), 0.9, Partition::Sequential, 0).unwrap_err();
        assert!(matches!(
            err,
            LoadError::EmptySplit { sessions: 1, side: "train", .. }
        ));
    }

    #[test]
    fn test_small_random_ratio_leaves_test_empty() {
        let err = split_sessions(sessions(3), 0.1, Partition::Random, 0).unwrap_err();
        assert!(matches!(err, LoadError::EmptySplit { side: "test", .. }));
    }

    #[test]
    fn test_sequential_prefix_split() {
        let (train, test) = split_sessions(sessions(10), 0.3, Partition::Sequential, 0).unwrap();
        let train_keys: Vec<&str> = train.keys().collect();
        let test_keys: Vec<&str> = test.keys().collect();
        assert_eq!(train_keys, vec!["s0", "s1", "s2", "s3", "s4", "s5", "s6"]);
        assert_eq!(test_keys, vec!["s7", "s8", "s9"]);
    }

    #[test]
    fn test_sequential_ignores_seed() {
        let (a_train, a_test) = split_sessions(sessions(9), 0.4, Partition::Sequential, 1).unwrap();
        let (b_train, b_test) = split_sessions(sessions(9), 0.4, Partition::Sequential, 999).unwrap();
        assert_eq!(a_train.keys().collect::<Vec<_>>(), b_train.keys().collect::<Vec<_>>());
        assert_eq!(a_test.keys().collect::<Vec<_>>(), b_test.keys().collect::<Vec<_>>());
    }

    #[test]
    fn test_random_is_seed_deterministic() {
        let (a_train, a_test) = split_sessions(sessions(50), 0.5, Partition::Random, 7).unwrap();
        let (b_train, b_test) = split_sessions(sessions(50), 0.5, Partition::Random, 7).unwrap();
        assert_eq!(a_train.keys().collect::<Vec<_>>(), b_train.keys().collect::<Vec<_>>());
        assert_eq!(a_test.keys().collect::<Vec<_>>(), b_test.keys().collect::<Vec<_>>());
        assert_eq!(a_test.len(), 25);
    }

    #[test]
    fn test_random_seeds_change_assignment() {
        let (_, a_test) = split_sessions(sessions(50), 0.5, Partition::Random, 1).unwrap();
        let (_, b_test) = split_sessions(sessions(50), 0.5, Partition::Random, 2).unwrap();
        assert_ne!(a_test.keys().collect::<Vec<_>>(), b_test.keys().collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_ratio() {
        for ratio in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            assert!(matches!(
                split_sessions(sessions(4), ratio, Partition::Sequential, 0),
                Err(LoadError::InvalidRatio(_))
            ));
        }
    }

    #[test]
    fn test_empty_input() {
        let (train, test) = split_sessions(SessionMap::new(), 0.5, Partition::Random, 0).unwrap();
        assert!(train.is_empty());
        assert!(test.is_empty());
    }
}
