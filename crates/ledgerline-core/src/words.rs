use crate::geometry::BBox;

/// A word reported by the upstream PDF text extractor.
///
/// Words are the atomic unit of the reconstruction pipeline: they carry no
/// table structure, only a text run and its position on the page.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Word {
    /// The text content of this word.
    pub text: String,
    /// Bounding box of the word in PDF points.
    pub bbox: BBox,
}

impl Word {
    /// Create a word from its text and box edges.
    pub fn new(text: impl Into<String>, x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self {
            text: text.into(),
            bbox: BBox::new(x0, top, x1, bottom),
        }
    }

    /// Line height of the word (box height).
    pub fn height(&self) -> f64 {
        self.bbox.height()
    }
}

/// Sort words spatially: top-to-bottom, then left-to-right.
pub fn sort_words(words: &mut [Word]) {
    words.sort_by(|a, b| {
        a.bbox
            .top
            .partial_cmp(&b.bbox.top)
            .unwrap()
            .then(a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap())
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_new() {
        let w = Word::new("Balance", 10.0, 100.0, 60.0, 112.0);
        assert_eq!(w.text, "Balance");
        assert_eq!(w.bbox, BBox::new(10.0, 100.0, 60.0, 112.0));
        assert_eq!(w.height(), 12.0);
    }

    #[test]
    fn test_sort_words_spatial() {
        let mut words = vec![
            Word::new("C", 10.0, 120.0, 20.0, 132.0),
            Word::new("B", 50.0, 100.0, 60.0, 112.0),
            Word::new("A", 10.0, 100.0, 20.0, 112.0),
        ];
        sort_words(&mut words);
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, ["A", "B", "C"]);
    }
}
