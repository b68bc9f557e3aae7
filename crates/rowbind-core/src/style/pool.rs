//! Style deduplication

use super::Style;
use ahash::AHashMap;

/// Interns styles so cells reference them by index. Index 0 is the default style.
#[derive(Debug)]
pub struct StylePool {
    styles: Vec<Style>,
    index: AHashMap<Style, u32>,
}

impl StylePool {
    pub fn new() -> Self {
        let mut index = AHashMap::with_capacity(16);
        index.insert(Style::default(), 0);
        Self {
            styles: vec![Style::default()],
            index,
        }
    }

    /// Index of an equal style, inserting it if new
    pub fn get_or_insert(&mut self, style: Style) -> u32 {
        if let Some(&idx) = self.index.get(&style) {
            return idx;
        }
        let idx = self.styles.len() as u32;
        self.index.insert(style.clone(), idx);
        self.styles.push(style);
        idx
    }

    pub fn get(&self, index: u32) -> Option<&Style> {
        self.styles.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Only the default style is present
    pub fn is_empty(&self) -> bool {
        self.styles.len() <= 1
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Style)> {
        self.styles.iter().enumerate().map(|(i, s)| (i as u32, s))
    }
}

impl Default for StylePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_style_at_zero() {
        let mut pool = StylePool::new();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get_or_insert(Style::default()), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_deduplication() {
        let mut pool = StylePool::new();

        let header = pool.get_or_insert(Style::new().bold(true).wrap_text(true));
        let again = pool.get_or_insert(Style::new().wrap_text(true).bold(true));
        let italic = pool.get_or_insert(Style::new().italic(true));

        assert_eq!(header, again);
        assert_ne!(header, italic);
        assert_eq!(pool.len(), 3);
        assert!(pool.get(header).unwrap().font.bold);
    }
}
