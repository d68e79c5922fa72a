//! Sorting of short sequences through fixed compare-exchange networks.
//!
//! The mode computation in the multilabel engines sorts neighborhoods of at
//! most 27 elements (9 in 2D), and the hot sizes are small enough that
//! optimal sorting networks beat the standard sort. The network tables come
//! from <https://bertdobbelaere.github.io/sorting_networks.html>; sizes
//! without a table fall back to [`slice::sort_unstable`].

/// Sort a short sequence in ascending order.
///
/// Sequences of length 2..=12, 18, 26 and 27 are sorted by a fixed
/// compare-exchange network; every other length falls back to
/// [`slice::sort_unstable`]. Equal elements are interchangeable, so the
/// networks being unstable is not observable.
///
/// # Examples
///
/// ```
/// let mut values = [3u8, 1, 2];
/// voxmorph_ops::smallsort::sort(&mut values);
/// assert_eq!(values, [1, 2, 3]);
/// ```
pub fn sort<T: Ord>(values: &mut [T]) {
    match values.len() {
        0 | 1 => {}
        2 => exchange(values, NET_2),
        3 => exchange(values, NET_3),
        4 => exchange(values, NET_4),
        5 => exchange(values, NET_5),
        6 => exchange(values, NET_6),
        7 => exchange(values, NET_7),
        8 => exchange(values, NET_8),
        9 => exchange(values, NET_9),
        10 => exchange(values, NET_10),
        11 => exchange(values, NET_11),
        12 => exchange(values, NET_12),
        18 => exchange(values, NET_18),
        26 => exchange(values, NET_26),
        27 => exchange(values, NET_27),
        _ => values.sort_unstable(),
    }
}

#[inline]
fn exchange<T: Ord>(values: &mut [T], network: &[(u8, u8)]) {
    for &(i, j) in network {
        if values[i as usize] > values[j as usize] {
            values.swap(i as usize, j as usize);
        }
    }
}

const NET_2: &[(u8, u8)] = &[
    (0, 1),
];

const NET_3: &[(u8, u8)] = &[
    (0, 2), (0, 1), (1, 2),
];

const NET_4: &[(u8, u8)] = &[
    (0, 2), (1, 3), (0, 1), (2, 3), (1, 2),
];

const NET_5: &[(u8, u8)] = &[
    (0, 3), (1, 4), (0, 2), (1, 3), (0, 1), (2, 4), (1, 2), (3, 4),
    (2, 3),
];

const NET_6: &[(u8, u8)] = &[
    (0, 5), (1, 3), (2, 4), (1, 2), (3, 4), (0, 3), (2, 5), (0, 1),
    (2, 3), (4, 5), (1, 2), (3, 4),
];

const NET_7: &[(u8, u8)] = &[
    (0, 6), (2, 3), (4, 5), (0, 2), (1, 4), (3, 6), (0, 1), (2, 5),
    (3, 4), (1, 2), (4, 6), (2, 3), (4, 5), (1, 2), (3, 4), (5, 6),
];

const NET_8: &[(u8, u8)] = &[
    (0, 2), (1, 3), (4, 6), (5, 7), (0, 4), (1, 5), (2, 6), (3, 7),
    (0, 1), (2, 3), (4, 5), (6, 7), (2, 4), (3, 5), (1, 4), (3, 6),
    (1, 2), (3, 4), (5, 6),
];

const NET_9: &[(u8, u8)] = &[
    (0, 3), (1, 7), (2, 5), (4, 8), (0, 7), (2, 4), (3, 8), (5, 6),
    (0, 2), (1, 3), (4, 5), (7, 8), (1, 4), (3, 6), (5, 7), (0, 1),
    (2, 4), (3, 5), (6, 8), (2, 3), (4, 5), (6, 7), (1, 2), (3, 4),
    (5, 6),
];

const NET_10: &[(u8, u8)] = &[
    (0, 8), (1, 9), (2, 7), (3, 5), (4, 6), (0, 2), (1, 4), (5, 8),
    (7, 9), (0, 3), (2, 4), (5, 7), (6, 9), (0, 1), (3, 6), (8, 9),
    (1, 5), (2, 3), (4, 8), (6, 7), (1, 2), (3, 5), (4, 6), (7, 8),
    (2, 3), (4, 5), (6, 7), (3, 4), (5, 6),
];

const NET_11: &[(u8, u8)] = &[
    (0, 9), (1, 6), (2, 4), (3, 7), (5, 8), (0, 1), (3, 5), (4, 10),
    (6, 9), (7, 8), (1, 3), (2, 5), (4, 7), (8, 10), (0, 4), (1, 2),
    (3, 7), (5, 9), (6, 8), (0, 1), (2, 6), (4, 5), (7, 8), (9, 10),
    (2, 4), (3, 6), (5, 7), (8, 9), (1, 2), (3, 4), (5, 6), (7, 8),
    (2, 3), (4, 5), (6, 7),
];

const NET_12: &[(u8, u8)] = &[
    (0, 8), (1, 7), (2, 6), (3, 11), (4, 10), (5, 9), (0, 1), (2, 5),
    (3, 4), (6, 9), (7, 8), (10, 11), (0, 2), (1, 6), (5, 10), (9, 11),
    (0, 3), (1, 2), (4, 6), (5, 7), (8, 11), (9, 10), (1, 4), (3, 5),
    (6, 8), (7, 10), (1, 3), (2, 5), (6, 9), (8, 10), (2, 3), (4, 5),
    (6, 7), (8, 9), (4, 6), (5, 7), (3, 4), (5, 6), (7, 8),
];

const NET_18: &[(u8, u8)] = &[
    (0, 1), (2, 3), (4, 5), (6, 7), (8, 9), (10, 11), (12, 13), (14, 15),
    (16, 17), (0, 2), (1, 3), (4, 12), (5, 13), (6, 8), (9, 11), (14, 16),
    (15, 17), (0, 14), (1, 16), (2, 15), (3, 17), (0, 6), (1, 10), (2, 9),
    (7, 16), (8, 15), (11, 17), (1, 4), (3, 9), (5, 7), (8, 14), (10, 12),
    (13, 16), (0, 1), (2, 5), (3, 13), (4, 14), (7, 9), (8, 10), (12, 15),
    (16, 17), (1, 2), (3, 5), (4, 6), (11, 13), (12, 14), (15, 16), (4, 8),
    (5, 12), (6, 10), (7, 11), (9, 13), (1, 4), (2, 8), (3, 6), (5, 7),
    (9, 15), (10, 12), (11, 14), (13, 16), (2, 4), (5, 8), (6, 10), (7, 11),
    (9, 12), (13, 15), (3, 5), (6, 8), (7, 10), (9, 11), (12, 14), (3, 4),
    (5, 6), (7, 8), (9, 10), (11, 12), (13, 14),
];

const NET_26: &[(u8, u8)] = &[
    (0, 1), (2, 3), (4, 5), (6, 7), (8, 9), (10, 11), (12, 13), (14, 15),
    (16, 17), (18, 19), (20, 21), (22, 23), (24, 25), (0, 2), (1, 3), (4, 6),
    (5, 7), (8, 10), (9, 11), (14, 16), (15, 17), (18, 20), (19, 21), (22, 24),
    (23, 25), (0, 4), (1, 6), (2, 5), (3, 7), (8, 14), (9, 16), (10, 15),
    (11, 17), (18, 22), (19, 24), (20, 23), (21, 25), (0, 18), (1, 19), (2, 20),
    (3, 21), (4, 22), (5, 23), (6, 24), (7, 25), (9, 12), (13, 16), (3, 11),
    (8, 9), (10, 13), (12, 15), (14, 22), (16, 17), (0, 8), (1, 9), (2, 14),
    (6, 12), (7, 15), (10, 18), (11, 23), (13, 19), (16, 24), (17, 25), (1, 2),
    (3, 18), (4, 8), (7, 22), (17, 21), (23, 24), (3, 14), (4, 10), (5, 18),
    (7, 20), (8, 13), (11, 22), (12, 17), (15, 21), (1, 4), (5, 6), (7, 9),
    (8, 10), (15, 17), (16, 18), (19, 20), (21, 24), (2, 5), (3, 10), (6, 14),
    (9, 13), (11, 19), (12, 16), (15, 22), (20, 23), (2, 8), (5, 7), (6, 9),
    (11, 12), (13, 14), (16, 19), (17, 23), (18, 20), (2, 4), (3, 5), (6, 11),
    (7, 10), (9, 16), (12, 13), (14, 19), (15, 18), (20, 22), (21, 23), (3, 4),
    (5, 8), (6, 7), (9, 11), (10, 12), (13, 15), (14, 16), (17, 20), (18, 19),
    (21, 22), (5, 6), (7, 8), (9, 10), (11, 12), (13, 14), (15, 16), (17, 18),
    (19, 20), (4, 5), (6, 7), (8, 9), (10, 11), (12, 13), (14, 15), (16, 17),
    (18, 19), (20, 21),
];

const NET_27: &[(u8, u8)] = &[
    (0, 1), (2, 3), (4, 5), (6, 7), (8, 9), (10, 11), (12, 13), (14, 15),
    (16, 17), (18, 19), (20, 21), (22, 23), (24, 25), (0, 2), (1, 3), (4, 6),
    (5, 7), (8, 10), (9, 11), (14, 16), (15, 17), (18, 20), (19, 21), (22, 24),
    (23, 25), (0, 4), (1, 5), (2, 6), (3, 7), (8, 14), (9, 16), (10, 13),
    (11, 17), (12, 15), (18, 22), (19, 23), (20, 24), (21, 25), (0, 18), (1, 19),
    (2, 20), (3, 21), (4, 22), (5, 23), (6, 24), (7, 25), (8, 12), (10, 14),
    (11, 15), (13, 17), (1, 18), (2, 10), (3, 20), (4, 8), (5, 22), (6, 14),
    (7, 24), (9, 12), (11, 19), (13, 16), (15, 23), (17, 21), (0, 4), (1, 9),
    (3, 13), (5, 15), (6, 18), (7, 19), (8, 11), (10, 20), (12, 22), (14, 17),
    (16, 24), (21, 25), (2, 4), (3, 11), (5, 9), (10, 12), (13, 15), (14, 22),
    (16, 20), (21, 23), (1, 4), (3, 8), (6, 10), (7, 13), (9, 11), (12, 18),
    (14, 16), (15, 19), (17, 22), (21, 24), (1, 2), (3, 6), (4, 5), (7, 12),
    (8, 10), (9, 14), (11, 16), (13, 18), (15, 17), (19, 22), (20, 21), (23, 24),
    (2, 3), (4, 6), (5, 10), (7, 9), (11, 13), (12, 14), (15, 20), (16, 18),
    (19, 21), (22, 23), (3, 4), (5, 6), (7, 8), (9, 10), (11, 12), (13, 14),
    (15, 16), (17, 18), (19, 20), (21, 22), (5, 7), (6, 8), (9, 11), (10, 12),
    (13, 15), (14, 16), (17, 19), (18, 20), (4, 5), (6, 7), (8, 9), (10, 11),
    (12, 13), (14, 15), (16, 17), (18, 19), (20, 21),
];

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::sort;

    #[test]
    fn test_network_sizes_match_sorted_reference() {
        let mut rng = StdRng::seed_from_u64(0x5ca1ab1e);
        for len in 0..=30 {
            for round in 0..50 {
                let mut values: Vec<u32> = (0..len).map(|_| rng.random_range(0..8)).collect();
                let mut expected = values.clone();
                expected.sort_unstable();
                sort(&mut values);
                assert_eq!(values, expected, "len {len} round {round}");
            }
        }
    }

    #[test]
    fn test_already_sorted_and_reversed() {
        for len in [2usize, 9, 12, 18, 26, 27] {
            let mut ascending: Vec<usize> = (0..len).collect();
            sort(&mut ascending);
            assert!(ascending.windows(2).all(|w| w[0] <= w[1]));

            let mut descending: Vec<usize> = (0..len).rev().collect();
            sort(&mut descending);
            assert_eq!(descending, (0..len).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_all_equal() {
        let mut values = [7i16; 27];
        sort(&mut values);
        assert!(values.iter().all(|&v| v == 7));
    }

    #[test]
    fn test_signed_values() {
        let mut values = [0i32, -5, 3, -5, 8, 0, -1, 2, 1];
        sort(&mut values);
        assert_eq!(values, [-5, -5, -1, 0, 0, 1, 2, 3, 8]);
    }
}
