use std::borrow::Borrow;

pub const DEFAULT_SEARCH_LIMIT: usize = 7;

const SCORE_EXACT: u32 = 100;
const SCORE_PREFIX: u32 = 90;
const SCORE_CONTAINS: u32 = 80;
const SCORE_TOKENS: u32 = 70;
const SCORE_SUBSEQUENCE: u32 = 60;

pub type FieldExtractor<T> = for<'a> fn(&'a T) -> Option<&'a str>;
pub type FieldsExtractor<T> = for<'a> fn(&'a T) -> Vec<&'a str>;

enum Field<T> {
    One(FieldExtractor<T>),
    Many(FieldsExtractor<T>),
}

pub struct FuzzySearchOption<T> {
    field: Field<T>,
    weight: u32,
}

impl<T> FuzzySearchOption<T> {
    pub fn new(extractor: FieldExtractor<T>) -> Self {
        Self::weighted(extractor, 1)
    }

    pub fn weighted(extractor: FieldExtractor<T>, weight: u32) -> Self {
        Self {
            field: Field::One(extractor),
            weight,
        }
    }

    /// A multi-valued field scores as its best-matching value.
    pub fn any_of(extractor: FieldsExtractor<T>) -> Self {
        Self {
            field: Field::Many(extractor),
            weight: 1,
        }
    }

    fn score(&self, query: &str, entity: &T) -> u32 {
        let best = match &self.field {
            Field::One(extractor) => extractor(entity)
                .map(|value| score_match(query, value))
                .unwrap_or(0),
            Field::Many(extractor) => extractor(entity)
                .into_iter()
                .map(|value| score_match(query, value))
                .max()
                .unwrap_or(0),
        };
        best * self.weight
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuzzyResult<E> {
    pub score: u32,
    pub entity: E,
}

pub struct FuzzySearcher<T> {
    options: Vec<FuzzySearchOption<T>>,
}

impl<T> FuzzySearcher<T> {
    pub fn new(options: Vec<FuzzySearchOption<T>>) -> Self {
        Self { options }
    }

    /// Ranks every candidate with a non-zero weighted score, best first.
    /// Equal scores keep their input order.
    pub fn search<E>(&self, terms: &str, items: &[E]) -> Vec<FuzzyResult<E>>
    where
        E: Borrow<T> + Clone,
    {
        let query = normalize_search(terms);
        if query.is_empty() {
            return Vec::new();
        }
        let mut results: Vec<FuzzyResult<E>> = items
            .iter()
            .filter_map(|item| {
                let score = self.score(&query, item.borrow());
                (score > 0).then(|| FuzzyResult {
                    score,
                    entity: item.clone(),
                })
            })
            .collect();
        results.sort_by(|a, b| b.score.cmp(&a.score));
        results
    }

    fn score(&self, query: &str, entity: &T) -> u32 {
        self.options
            .iter()
            .map(|option| option.score(query, entity))
            .sum()
    }
}

pub trait SubListNonStrict {
    /// Keeps at most `limit` leading elements; shorter lists are returned whole.
    fn sub_list_non_strict(self, limit: usize) -> Self;
}

impl<T> SubListNonStrict for Vec<T> {
    fn sub_list_non_strict(mut self, limit: usize) -> Self {
        self.truncate(limit);
        self
    }
}

pub fn normalize_search(value: &str) -> String {
    let mut out = String::new();
    let mut last_space = false;
    for ch in value.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim().to_string()
}

/// Scores an already-normalized query against a raw candidate value.
pub fn score_match(query: &str, candidate: &str) -> u32 {
    if query.is_empty() {
        return 0;
    }
    let target = normalize_search(candidate);
    if target.is_empty() {
        return 0;
    }

    if target == query {
        return SCORE_EXACT;
    }
    if target.starts_with(query) {
        return SCORE_PREFIX;
    }
    if target.contains(query) {
        return SCORE_CONTAINS;
    }

    let query_tokens: Vec<&str> = query.split_whitespace().collect();
    if !query_tokens.is_empty() && query_tokens.iter().all(|token| target.contains(token)) {
        return SCORE_TOKENS;
    }

    if is_subsequence(query, &target) {
        return SCORE_SUBSEQUENCE;
    }

    0
}

fn is_subsequence(query: &str, target: &str) -> bool {
    let mut q = query.chars().filter(|ch| !ch.is_whitespace());
    let mut current = q.next();
    for ch in target.chars().filter(|ch| !ch.is_whitespace()) {
        match current {
            Some(needle) if ch == needle => current = q.next(),
            Some(_) => {}
            None => break,
        }
    }
    current.is_none()
}
