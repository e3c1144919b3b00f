//! Тесты модуля `runner`.
//!
//! Здесь лежат unit-тесты отдельных компонентов и тесты цикла обработки вызовов.

mod executor;
