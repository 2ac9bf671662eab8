use crate::words::Word;

/// A visual row: words clustered on the same y-level.
#[derive(Debug, Clone, PartialEq)]
pub struct RowCluster {
    /// The `top` of the first word assigned to this row, used as the
    /// cluster key during single-linkage grouping.
    pub anchor_top: f64,
    /// Words in this row, sorted left-to-right.
    pub words: Vec<Word>,
}

/// Cluster words into visual rows by top-proximity.
///
/// Two words land in the same row iff the second word's `top` is within
/// `tolerance` of the row's anchor top (the `top` of the row's first word,
/// in top-sorted order). Words within each row are sorted left-to-right and
/// rows are returned top-to-bottom.
pub fn cluster_into_rows(words: &[Word], tolerance: f64) -> Vec<RowCluster> {
    if words.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&Word> = words.iter().collect();
    sorted.sort_by(|a, b| a.bbox.top.partial_cmp(&b.bbox.top).unwrap());

    let mut rows: Vec<RowCluster> = Vec::new();
    for word in sorted {
        match rows
            .iter_mut()
            .find(|row| (word.bbox.top - row.anchor_top).abs() <= tolerance)
        {
            Some(row) => row.words.push(word.clone()),
            None => rows.push(RowCluster {
                anchor_top: word.bbox.top,
                words: vec![word.clone()],
            }),
        }
    }

    for row in &mut rows {
        row.words
            .sort_by(|a, b| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap());
    }
    rows.sort_by(|a, b| a.anchor_top.partial_cmp(&b.anchor_top).unwrap());
    rows
}
