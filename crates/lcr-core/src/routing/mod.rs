//! Least-cost candidate selection

mod candidates;
mod resolver;

pub use candidates::RouteCandidateList;
pub use resolver::RouteResolver;
