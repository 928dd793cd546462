/// Builds a parameter array for `query`/`execute` calls, casting every
/// argument to `&(dyn ToSql + Sync)`. Invoke with brackets: `dbargs![&a, &b]`.
macro_rules! dbargs {
    () => {
        [] as [&(dyn postgres_types::ToSql + Sync); 0]
    };
    ($($arg:expr),+ $(,)?) => {
        [$($arg as &(dyn postgres_types::ToSql + Sync)),+]
    };
}

pub(crate) use dbargs;
