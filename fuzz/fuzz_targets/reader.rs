#![no_main]

use libfuzzer_sys::fuzz_target;

// Whatever the reader accepts must print back to something it reads the
// same way
fuzz_target!(|source: &str| {
    let Ok(expressions) = scm::parse_all(source) else {
        return;
    };

    for expression in expressions {
        let printed = expression.to_string();
        let read_back = scm::parse(&printed).expect("printed expression should read back");
        assert_eq!(read_back.to_string(), printed);
    }
});
