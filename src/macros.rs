/// Wire a source through zero or more stages.
///
/// The source is adapted with [`from`][crate::from], then every stage is
/// called with the output of the one before it. The shape of the result is
/// whatever the last stage returns: operators keep it a sequence, while
/// sinks such as [`sink::to_array`][crate::sink::to_array] or
/// [`sink::to_writer`][crate::sink::to_writer] turn it into a future to
/// await.
///
/// # Example
///
/// ```rust
/// use asyncerator::{operator, pipeline, sink};
/// use futures_lite::future::block_on;
///
/// # block_on(async {
/// // A sequence: no sink at the end.
/// let doubled = pipeline!(vec![1, 2, 3], operator::map(|n: i32| n * 2));
///
/// // A future: the last stage is a sink.
/// let sum = pipeline!(
///     doubled,
///     operator::filter(|n: &i32| *n > 2),
///     sink::reduce(|acc, n: i32, _| acc + n, 0)
/// )
/// .await?;
/// assert_eq!(sum, 10);
/// # Ok::<(), asyncerator::Error>(())
/// # }).unwrap();
/// ```
#[macro_export]
macro_rules! pipeline {
    ($source:expr $(, $stage:expr)* $(,)?) => {{
        let sequence = $crate::from($source);
        $(let sequence = ($stage)(sequence);)*
        sequence
    }};
}
