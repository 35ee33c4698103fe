use chrono::Utc;

pub fn get_now_unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_after_2020() {
        assert!(get_now_unix_millis() > 1_577_836_800_000);
    }
}
