//! Cross-crate scenarios.

#[cfg(test)]
mod admission;
#[cfg(test)]
mod composition;
#[cfg(test)]
mod lifecycle;
#[cfg(test)]
mod properties;
#[cfg(test)]
mod recorder;
