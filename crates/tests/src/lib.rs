
#[cfg(test)]
mod correction_tests;
