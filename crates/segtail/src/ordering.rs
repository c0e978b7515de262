// Segment ordering: length first, then byte-wise.
//
// For names sharing a fixed prefix/suffix around an unpadded decimal index
// (`seg1.ts` .. `seg42.ts`) the length of the name grows with the index, so
// this approximates numeric order without parsing digits. Zero-padded names of
// differing width are mis-ordered.

use std::cmp::Ordering;

use crate::storage::ListEntry;

/// Compares two segment names: the shorter name sorts first, equal lengths
/// compare lexically.
pub fn compare_segment_names(l: &str, r: &str) -> Ordering {
    l.len()
        .cmp(&r.len())
        .then_with(|| l.as_bytes().cmp(r.as_bytes()))
}

/// Sorts a listing in place with [`compare_segment_names`].
pub fn sort_listing(entries: &mut [ListEntry]) {
    entries.sort_by(|l, r| compare_segment_names(&l.name, &r.name));
}
