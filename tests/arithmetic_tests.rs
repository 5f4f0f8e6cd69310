use hexpat::console::LogLevel;
use hexpat::interpreter::errors::EvalError;
use hexpat::memory::data_source::MemoryDataSource;
use hexpat::{PatternLanguage, PatternLanguageError};

/// Run `source` and collect everything it printed
fn printed(source: &str, bytes: &[u8]) -> Vec<String> {
    let mut data = MemoryDataSource::new(bytes.to_vec());
    let mut runtime = PatternLanguage::new();
    if runtime.execute_string(&mut data, source).is_none() {
        panic!("Execution failed: {:?}", runtime.error());
    }

    runtime
        .console_log()
        .iter()
        .filter(|(level, _)| *level == LogLevel::Info)
        .map(|(_, message)| message.clone())
        .collect()
}

#[test]
fn test_arithmetic_coercion() {
    let source = r#"
        std::print("Char + Int: ", 'a' + 10);
        std::print("Int - Char: ", 10 - 'a');
        std::print("Char * Char: ", 'a' * 'a');
        std::print("Int / Int: ", 7 / 2);
        std::print("Negative division: ", -7 / 2);
        std::print("Remainder: ", 7 % 3);
        std::print("Float + Int: ", 1.5 + 1);
        std::print("Shift: ", 1 << 4);
        std::print("Mask: ", 0xF0 | 0x0F);
        std::print("Comparison Char == Int: ", 'a' == 97);
        std::print("Strings: ", "ab" == "ab");
        std::print("Ternary: ", 1 > 2 ? "yes" : "no");
    "#;

    let output = printed(source, &[]);
    println!("Console output:\n{}", output.join("\n"));

    assert_eq!(
        output,
        vec![
            "Char + Int: 107",
            "Int - Char: -87",
            "Char * Char: 193",
            "Int / Int: 3",
            "Negative division: -3",
            "Remainder: 1",
            "Float + Int: 2.500000",
            "Shift: 16",
            "Mask: 255",
            "Comparison Char == Int: true",
            "Strings: true",
            "Ternary: no",
        ]
    );
}

#[test]
fn test_pattern_values_in_expressions() {
    let source = r#"
        u8 byte @ 0;
        s8 signed_byte @ 1;
        be u16 word @ 2;

        std::print(byte + 1);
        std::print(signed_byte * 2);
        std::print(word >> 8);
        std::print(sizeof(word) + sizeof(u32));
    "#;

    let output = printed(source, &[0xFF, 0xFE, 0xAB, 0xCD]);
    assert_eq!(output, vec!["256", "-4", "171", "6"]);
}

#[test]
fn test_division_by_zero() {
    let mut data = MemoryDataSource::new(vec![0]);
    let mut runtime = PatternLanguage::new();

    assert!(runtime.execute_string(&mut data, "u8 zero;\nstd::print(10 / zero);").is_none());

    let err = runtime.error().unwrap();
    assert!(matches!(err, PatternLanguageError::Evaluation(EvalError::DivisionByZero { .. })));
    assert_eq!(err.line(), 2);
}
