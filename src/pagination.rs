use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl PageRequest {
    /// Les bornes sont vérifiées en amont par le validator des requêtes.
    pub fn new(page: Option<u64>, limit: Option<u64>, default_limit: u64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).max(1),
        }
    }

    /// Sature au lieu de déborder: une page très lointaine est juste vide.
    pub fn offset(&self) -> usize {
        let offset = (self.page - 1).saturating_mul(self.limit);
        usize::try_from(offset).unwrap_or(usize::MAX)
    }

    /// Découpe une liste déjà filtrée et triée.
    pub fn apply<T>(&self, items: Vec<T>) -> Paginated<T> {
        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(self.offset())
            .take(usize::try_from(self.limit).unwrap_or(usize::MAX))
            .collect();

        Paginated {
            items,
            pagination: Pagination {
                current_page: self.page,
                total_pages: total.div_ceil(self.limit),
                total_items: total,
                has_next: self.page.saturating_mul(self.limit) < total,
                has_prev: self.page > 1,
            },
        }
    }
}
