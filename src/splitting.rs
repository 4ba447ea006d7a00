//! Load splitting heuristics.
//!
//! A splitting heuristic receives the load profile along the axis that is cut
//! (one entry per slice of cells) and the number of processes of the node.
//! It returns `(cut, nproc_left)`: slices `0..=cut` and `nproc_left` processes go
//! to the left child, the rest to the right child.

use tracing::trace;

use crate::{
    constants::{FAST_SPLIT_TARGET, PROCESS_IMBALANCE_PENALTY},
    error::{Error, Result},
    tools::{find_nearest, middle_most_min_element, prefix_sum},
};

fn check_arguments(loads: &[f64], nproc: usize) -> Result<()> {
    if loads.is_empty() {
        return Err(Error::InvalidArgument(
            "cannot split an empty load profile".to_string(),
        ));
    }
    if nproc < 2 {
        return Err(Error::InvalidArgument(format!(
            "cannot split {} process(es) into two groups",
            nproc
        )));
    }
    Ok(())
}

/// Split the processes in half and cut where the load matches that fraction.
///
/// For odd `nproc` the left child receives `nproc / 2` processes and the
/// target load is scaled accordingly.
pub fn fast_splitting(loads: &[f64], nproc: usize) -> Result<(usize, usize)> {
    check_arguments(loads, nproc)?;

    let nproc_left = (FAST_SPLIT_TARGET * nproc as f64) as usize;
    let frac = nproc_left as f64 / nproc as f64;

    let prefix = prefix_sum(loads);
    let total = prefix[prefix.len() - 1];
    let cut = find_nearest(&prefix, frac * total).unwrap_or(0);

    Ok((cut, nproc_left))
}

/// A candidate of the quality splitting.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    cost: f64,
    cut: usize,
    nproc_left: usize,
}

/// Try every process split and choose the one with the smallest penalized maximum load.
///
/// For `size1` processes on the left the cut is placed nearest to the load fraction
/// `size1 / nproc`. The cost of a candidate is the larger of the two per-process
/// loads, increased by one percent for every process of difference between the
/// two groups. Equal costs resolve to the candidate closest to the middle.
pub fn quality_splitting(loads: &[f64], nproc: usize) -> Result<(usize, usize)> {
    check_arguments(loads, nproc)?;

    let prefix = prefix_sum(loads);
    let total = prefix[prefix.len() - 1];

    let candidates = (1..nproc)
        .map(|size1| {
            let frac = size1 as f64 / nproc as f64;
            let cut = find_nearest(&prefix, frac * total).unwrap_or(0);

            let pprefix = size1;
            let psuffix = nproc - size1;
            let lprefix = prefix[cut];
            let lsuffix = total - prefix[cut];

            let penalty = 1.0 + PROCESS_IMBALANCE_PENALTY * pprefix.abs_diff(psuffix) as f64;
            let cost = f64::max(lprefix / pprefix as f64, lsuffix / psuffix as f64) * penalty;

            Candidate {
                cost,
                cut,
                nproc_left: size1,
            }
        })
        .collect::<Vec<_>>();

    let best = middle_most_min_element(&candidates, |a, b| a.cost < b.cost)
        .map(|index| candidates[index])
        .ok_or_else(|| Error::InvalidArgument("no splitting candidate".to_string()))?;

    trace!(
        nproc,
        cut = best.cut,
        nproc_left = best.nproc_left,
        cost = best.cost,
        "quality splitting"
    );

    Ok((best.cut, best.nproc_left))
}

#[cfg(test)]
mod test {
    use proptest::prelude::{prop_assert, proptest};

    use super::{fast_splitting, quality_splitting};

    #[test]
    fn test_fast_splitting() {
        assert_eq!(fast_splitting(&[1.0, 1.0, 1.0, 1.0], 2).unwrap(), (1, 1));

        // Odd process counts put the smaller half to the left.
        assert_eq!(
            fast_splitting(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0], 3).unwrap(),
            (1, 1)
        );

        // The cut follows the load, not the number of slices.
        assert_eq!(fast_splitting(&[5.0, 1.0, 1.0, 1.0], 2).unwrap(), (0, 1));
    }

    #[test]
    fn test_quality_splitting() {
        assert_eq!(quality_splitting(&[1.0, 1.0, 1.0, 1.0], 2).unwrap(), (1, 1));

        // Both candidates cost 2.02. The middle one (two processes left) wins.
        assert_eq!(
            quality_splitting(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0], 3).unwrap(),
            (3, 2)
        );

        // Slice loads 1..=8 on four processes favour three processes on the left.
        let loads = (1..=8).map(|x| x as f64).collect::<Vec<_>>();
        assert_eq!(quality_splitting(&loads, 4).unwrap(), (6, 3));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(fast_splitting(&[], 4).is_err());
        assert!(quality_splitting(&[], 4).is_err());
        assert!(fast_splitting(&[1.0], 1).is_err());
        assert!(quality_splitting(&[1.0], 0).is_err());
    }

    proptest! {
        #[test]
        fn test_quality_splitting_ranges(
            loads in proptest::collection::vec(0.0f64..100.0, 1..40),
            nproc in 2usize..64
        ) {
            let (cut, nproc_left) = quality_splitting(&loads, nproc).unwrap();
            prop_assert!(cut < loads.len());
            prop_assert!((1..nproc).contains(&nproc_left));

            let (cut, nproc_left) = fast_splitting(&loads, nproc).unwrap();
            prop_assert!(cut < loads.len());
            prop_assert!((1..nproc).contains(&nproc_left));
        }
    }
}
