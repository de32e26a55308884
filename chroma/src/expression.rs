use std::ops::{Add, Div};

use serde_json::{json, Value};

use crate::types::SparseVector;

/// Query vector for a KNN rank term.
#[derive(Clone, Debug)]
pub enum KnnQuery {
    Dense(Vec<f32>),
    Sparse(SparseVector),
}

/// A server-evaluated ranking expression.
///
/// Expressions compose with `+` and `/` the way the store's query language
/// does, e.g. a weighted reciprocal-rank term is
/// `Rank::val(-weight) / (Rank::val(k) + knn)`.
#[derive(Clone, Debug)]
pub enum Rank {
    /// K-nearest-neighbour scan over an indexed key, yielding the 1-based
    /// in-channel rank when `return_rank` is set.
    Knn {
        query: KnnQuery,
        key: String,
        limit: usize,
        return_rank: bool,
    },
    Val(f64),
    Sum(Vec<Rank>),
    Div(Box<Rank>, Box<Rank>),
}

impl Rank {
    pub fn val(value: f64) -> Self {
        Rank::Val(value)
    }

    pub fn knn(query: KnnQuery, key: impl Into<String>, limit: usize) -> Self {
        Rank::Knn {
            query,
            key: key.into(),
            limit,
            return_rank: true,
        }
    }

    /// Serialize to the wire representation.
    pub fn to_value(&self) -> Value {
        match self {
            Rank::Knn {
                query,
                key,
                limit,
                return_rank,
            } => {
                let query_value = match query {
                    KnnQuery::Dense(vector) => json!(vector),
                    KnnQuery::Sparse(vector) => json!(vector),
                };
                json!({
                    "$knn": {
                        "query": query_value,
                        "key": key,
                        "limit": limit,
                        "return_rank": return_rank,
                    }
                })
            }
            Rank::Val(value) => json!({ "$val": value }),
            Rank::Sum(terms) => {
                let terms: Vec<Value> = terms.iter().map(Rank::to_value).collect();
                json!({ "$sum": terms })
            }
            Rank::Div(left, right) => json!({
                "$div": { "left": left.to_value(), "right": right.to_value() }
            }),
        }
    }
}

impl Add for Rank {
    type Output = Rank;

    fn add(self, other: Rank) -> Rank {
        match (self, other) {
            (Rank::Sum(mut terms), rhs) => {
                terms.push(rhs);
                Rank::Sum(terms)
            }
            (lhs, rhs) => Rank::Sum(vec![lhs, rhs]),
        }
    }
}

impl Div for Rank {
    type Output = Rank;

    fn div(self, other: Rank) -> Rank {
        Rank::Div(Box::new(self), Box::new(other))
    }
}

/// Builder for a rank-expression search payload.
#[derive(Clone, Debug)]
pub struct Search {
    rank: Option<Rank>,
    limit: usize,
    select: Vec<String>,
}

impl Search {
    pub fn new() -> Self {
        Self {
            rank: None,
            limit: 10,
            select: Vec::new(),
        }
    }

    pub fn rank(mut self, rank: Rank) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn to_value(&self) -> Value {
        let mut payload = json!({ "limit": self.limit });
        if let Some(ref rank) = self.rank {
            payload["rank"] = rank.to_value();
        }
        if !self.select.is_empty() {
            payload["select"] = json!(self.select);
        }
        payload
    }
}

impl Default for Search {
    fn default() -> Self {
        Self::new()
    }
}
