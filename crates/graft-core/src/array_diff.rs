//! Edit scripts between two ordered sequences.
//!
//! [`diff_sequences`] walks the new sequence once while keeping a working
//! copy of the old one, preferring to keep or move an existing item over
//! removing it and adding a fresh one. Operations must be applied in the
//! order they are returned.

/// One step of an edit script.
///
/// `index` is always a position in the working sequence at the moment the
/// operation is applied; `original_index` points into the old sequence.
/// Added and moved items are `new[index]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayDiffOp {
    Add {
        index: usize,
    },
    Remove {
        index: usize,
        original_index: usize,
    },
    Move {
        original_index: usize,
        from: usize,
        index: usize,
    },
    Noop {
        original_index: usize,
        index: usize,
    },
}

/// Compute the edit script turning `old` into `new` under `eq`.
///
/// Runs in `O(n * m)`; duplicates are matched left to right, first
/// unconsumed match wins.
pub fn diff_sequences<T>(old: &[T], new: &[T], eq: impl Fn(&T, &T) -> bool) -> Vec<ArrayDiffOp> {
    let mut ops = Vec::new();
    // Original indices of the old items still in play, in current order.
    let mut working: Vec<Option<usize>> = (0..old.len()).map(Some).collect();

    let mut index = 0;
    while index < new.len() {
        let next = &new[index];

        if let Some(&Some(original_index)) = working.get(index) {
            let current = &old[original_index];
            if !new.iter().any(|item| eq(current, item)) {
                ops.push(ArrayDiffOp::Remove {
                    index,
                    original_index,
                });
                working.remove(index);
                continue;
            }
            if eq(current, next) {
                ops.push(ArrayDiffOp::Noop {
                    original_index,
                    index,
                });
                index += 1;
                continue;
            }
        }

        let found = working
            .iter()
            .enumerate()
            .skip(index)
            .find_map(|(position, slot)| match slot {
                Some(original) if eq(&old[*original], next) => Some((position, *original)),
                _ => None,
            });

        match found {
            None => {
                ops.push(ArrayDiffOp::Add { index });
                working.insert(index, None);
            }
            Some((from, original_index)) => {
                working.remove(from);
                ops.push(ArrayDiffOp::Move {
                    original_index,
                    from,
                    index,
                });
                working.insert(index, Some(original_index));
            }
        }
        index += 1;
    }

    for original_index in working.drain(index.min(working.len())..).flatten() {
        ops.push(ArrayDiffOp::Remove {
            index,
            original_index,
        });
    }

    ops
}

/// Apply an edit script to a copy of `old`, producing the sequence it
/// describes. Used to check scripts against their target.
pub fn apply_ops<T: Clone>(old: &[T], new: &[T], ops: &[ArrayDiffOp]) -> Vec<T> {
    let mut working: Vec<T> = old.to_vec();
    for op in ops {
        match *op {
            ArrayDiffOp::Add { index } => working.insert(index, new[index].clone()),
            ArrayDiffOp::Remove { index, .. } => {
                working.remove(index);
            }
            ArrayDiffOp::Move { from, index, .. } => {
                working.remove(from);
                working.insert(index, new[index].clone());
            }
            ArrayDiffOp::Noop { index, .. } => working[index] = new[index].clone(),
        }
    }
    working
}
