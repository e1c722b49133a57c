//! Tolerant, recovery-oriented single-pass C header recognizer (spec.md
//! §4.7). It does not invoke the C preprocessor — `#include` is ignored —
//! and it does not build a full AST: it recognizes just enough shape to
//! harvest function declarations, enum values, object-like macros and
//! struct layouts, skipping everything else as balanced groups.
//!
//! Two invariants keep this safe on hostile or merely unusual input
//! (spec.md §4.7 "Robustness"): a hard cap on the number of top-level
//! productions recognized, and a guarantee that every iteration of the
//! main loop advances the cursor by at least one byte even when nothing
//! matched.

use brisk_core::CType;
use tracing::{debug, trace, warn};

const MAX_PRODUCTIONS: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub enum MacroValue {
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: CType,
    pub params: Vec<CType>,
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<(String, CType)>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedHeader {
    pub functions: Vec<FunctionDecl>,
    pub enumerators: Vec<(String, i64)>,
    pub macros: Vec<(String, MacroValue)>,
    pub structs: Vec<StructDecl>,
}

/// Parse `source`. Never fails outright — unrecognized input is skipped —
/// but logs what it gave up on, matching spec.md §4.7's "tolerant,
/// recovery-oriented" description.
pub fn parse_header(source: &str) -> ParsedHeader {
    let mut p = HeaderParser {
        chars: source.chars().collect(),
        pos: 0,
        out: ParsedHeader::default(),
    };
    p.run();
    p.out
}

struct HeaderParser {
    chars: Vec<char>,
    pos: usize,
    out: ParsedHeader,
}

impl HeaderParser {
    fn run(&mut self) {
        let mut productions = 0usize;
        while !self.at_end() {
            if productions >= MAX_PRODUCTIONS {
                warn!(productions, "header parser hit its iteration cap, stopping early");
                break;
            }
            let before = self.pos;
            self.skip_trivia();
            if self.at_end() {
                break;
            }
            self.top_level_production();
            if self.pos == before {
                // No production matched and nothing was skipped: force
                // forward progress so malformed input can't hang us.
                self.pos += 1;
            }
            productions += 1;
        }
    }

    fn top_level_production(&mut self) {
        if self.match_word("#define") {
            self.parse_define();
        } else if self.match_word("typedef") {
            self.skip_to_semicolon_balanced();
        } else if self.match_word("enum") {
            self.parse_enum();
        } else if self.match_word("struct") || self.match_word("union") {
            self.parse_struct_or_union();
        } else if self.match_word("extern") {
            self.skip_trivia();
            if self.peek() == Some('"') {
                // extern "C" { ... } — skip the keyword and string, but
                // keep parsing the braced body at the top level.
                self.skip_string_literal();
                self.skip_trivia();
                if self.peek() == Some('{') {
                    self.advance(); // consume the brace, not the body
                }
            }
            // otherwise: a bare `extern` qualifier falls through into
            // the function/variable declaration path below.
        } else if self.looks_like_gnu_extension() {
            self.skip_gnu_extension();
        } else if self.looks_like_declaration() {
            self.parse_function_decl();
        } else {
            // Unrecognized token: consume one identifier/punctuation unit
            // and move on.
            self.skip_one_token();
        }
    }

    // ---- #define ----

    fn parse_define(&mut self) {
        self.skip_inline_ws();
        let name = self.read_ident();
        if name.is_empty() {
            return;
        }
        // Function-like macro: `NAME(` with no space — not supported,
        // skip the rest of the line.
        if self.peek() == Some('(') {
            self.skip_to_eol();
            return;
        }
        self.skip_inline_ws();
        let value = self.read_to_eol().trim().to_string();
        if value.is_empty() {
            return;
        }
        let parsed = parse_macro_value(&value);
        debug!(name = %name, ?parsed, "recognized #define");
        self.out.macros.push((name, parsed));
    }

    // ---- enum ----

    fn parse_enum(&mut self) {
        self.skip_trivia();
        // Optional tag name.
        if self.peek().is_some_and(is_ident_start) {
            self.read_ident();
            self.skip_trivia();
        }
        if self.peek() != Some('{') {
            self.skip_to_semicolon_balanced();
            return;
        }
        self.advance(); // {
        let mut next_value = 0i64;
        loop {
            self.skip_trivia();
            if self.peek() == Some('}') || self.at_end() {
                break;
            }
            let name = self.read_ident();
            if name.is_empty() {
                self.skip_one_token();
                continue;
            }
            self.skip_trivia();
            let value = if self.peek() == Some('=') {
                self.advance();
                self.skip_trivia();
                self.read_const_int().unwrap_or(next_value)
            } else {
                next_value
            };
            self.out.enumerators.push((name, value));
            next_value = value + 1;
            self.skip_trivia();
            if self.peek() == Some(',') {
                self.advance();
            }
        }
        self.skip_to_semicolon_balanced();
    }

    // ---- struct / union ----

    fn parse_struct_or_union(&mut self) {
        self.skip_trivia();
        let name = if self.peek().is_some_and(is_ident_start) {
            self.read_ident()
        } else {
            String::new()
        };
        self.skip_trivia();
        if self.peek() != Some('{') {
            self.skip_to_semicolon_balanced();
            return;
        }
        self.advance(); // {
        let mut fields = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some('}') || self.at_end() {
                break;
            }
            if let Some((field_name, ty)) = self.parse_field_decl() {
                fields.push((field_name, ty));
            } else {
                self.skip_one_token();
            }
        }
        if self.peek() == Some('}') {
            self.advance();
        }
        self.skip_to_semicolon_balanced();
        if !name.is_empty() && !fields.is_empty() {
            self.out.structs.push(StructDecl { name, fields });
        }
    }

    fn parse_field_decl(&mut self) -> Option<(String, CType)> {
        let start = self.pos;
        let ty = self.recognize_type()?;
        self.skip_trivia();
        let name = self.read_ident();
        if name.is_empty() {
            self.pos = start;
            return None;
        }
        self.skip_trivia();
        // Array fields (`int x[4];`) are recognized but not sized here;
        // treated as a pointer for marshalling purposes.
        let ty = if self.peek() == Some('[') {
            self.skip_balanced('[', ']');
            CType::Pointer
        } else {
            ty
        };
        self.skip_trivia();
        if self.peek() == Some(';') {
            self.advance();
        }
        Some((name, ty))
    }

    // ---- function declarations ----

    fn looks_like_declaration(&mut self) -> bool {
        let save = self.pos;
        let ok = self.recognize_type().is_some();
        self.pos = save;
        ok
    }

    fn parse_function_decl(&mut self) {
        let Some(return_type) = self.recognize_type() else {
            self.skip_one_token();
            return;
        };
        self.skip_trivia();
        let name = self.read_ident();
        if name.is_empty() {
            self.skip_to_semicolon_balanced();
            return;
        }
        self.skip_trivia();
        if self.peek() != Some('(') {
            // Not a function — a variable declaration. Skip to `;`.
            self.skip_to_semicolon_balanced();
            return;
        }
        self.advance(); // (
        let (params, variadic) = self.parse_param_list();
        self.skip_trivia();
        self.skip_gnu_extension_if_present();
        self.skip_trivia();
        match self.peek() {
            Some(';') => {
                self.advance();
            }
            Some('{') => {
                self.skip_balanced('{', '}');
            }
            _ => self.skip_to_semicolon_balanced(),
        }
        trace!(name = %name, "recognized function declaration");
        self.out.functions.push(FunctionDecl {
            name,
            return_type,
            params,
            variadic,
        });
    }

    fn parse_param_list(&mut self) -> (Vec<CType>, bool) {
        let mut params = Vec::new();
        let mut variadic = false;
        self.skip_trivia();
        if self.peek() == Some(')') {
            self.advance();
            return (params, variadic);
        }
        // `(void)` is the empty-parameter marker.
        let save = self.pos;
        if self.match_word("void") {
            self.skip_trivia();
            if self.peek() == Some(')') {
                self.advance();
                return (params, variadic);
            }
            self.pos = save;
        }
        loop {
            self.skip_trivia();
            if self.peek() == Some('.') {
                // `...`
                while self.peek() == Some('.') {
                    self.advance();
                }
                variadic = true;
            } else if let Some(ty) = self.recognize_type() {
                self.skip_trivia();
                // Optional parameter name.
                if self.peek().is_some_and(is_ident_start) {
                    self.read_ident();
                }
                self.skip_trivia();
                if self.peek() == Some('[') {
                    self.skip_balanced('[', ']');
                }
                self.skip_gnu_extension_if_present();
                params.push(ty);
            } else {
                self.skip_one_token();
            }
            self.skip_trivia();
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                Some(')') => {
                    self.advance();
                    break;
                }
                None => break,
                _ => self.skip_one_token(),
            }
        }
        (params, variadic)
    }

    /// Qualifiers, optional signedness, a recognized base type, then zero
    /// or more `*`. `char*`/`const char*` is elevated to `CType::CString`
    /// (spec.md §4.7).
    fn recognize_type(&mut self) -> Option<CType> {
        let save = self.pos;
        let mut saw_anything = false;
        loop {
            self.skip_trivia();
            if self.match_word("const")
                || self.match_word("volatile")
                || self.match_word("static")
                || self.match_word("extern")
                || self.match_word("inline")
                || self.match_word("register")
            {
                saw_anything = true;
                continue;
            }
            break;
        }
        self.skip_trivia();
        let mut unsigned = None;
        if self.match_word("unsigned") {
            unsigned = Some(true);
            saw_anything = true;
        } else if self.match_word("signed") {
            unsigned = Some(false);
            saw_anything = true;
        }
        self.skip_trivia();
        let base = self.read_ident();
        if base.is_empty() {
            if !saw_anything {
                self.pos = save;
                return None;
            }
            // Qualifiers with no base type at all is not a type.
            self.pos = save;
            return None;
        }
        let mut ty = base_type_from_ident(&base, unsigned);
        // `long long`, `long int`, `short int`.
        if base == "long" {
            self.skip_trivia();
            if self.match_word("long") {
                ty = if unsigned == Some(true) {
                    CType::ULongLong
                } else {
                    CType::LongLong
                };
            } else if self.match_word("int") {
                // plain `long int`, already covered by `ty`.
            }
        } else if base == "short" || base == "unsigned" {
            self.skip_trivia();
            let _ = self.match_word("int");
        }
        self.skip_trivia();
        let mut star_count = 0;
        while self.peek() == Some('*') {
            self.advance();
            star_count += 1;
            self.skip_trivia();
        }
        if star_count > 0 {
            ty = if ty == CType::SChar || ty == CType::UChar || ty == CType::I8 {
                CType::CString
            } else {
                CType::Pointer
            };
        }
        Some(ty)
    }

    // ---- GNU extensions ----

    fn looks_like_gnu_extension(&mut self) -> bool {
        let save = self.pos;
        let word = self.read_ident();
        self.pos = save;
        word.starts_with("__") || word == "__THROW"
    }

    fn skip_gnu_extension(&mut self) {
        self.read_ident();
        self.skip_gnu_extension_if_present();
    }

    fn skip_gnu_extension_if_present(&mut self) {
        loop {
            self.skip_trivia();
            let save = self.pos;
            let word = self.read_ident();
            if word.starts_with("__") {
                self.skip_trivia();
                if self.peek() == Some('(') {
                    self.skip_balanced('(', ')');
                }
            } else {
                self.pos = save;
                break;
            }
        }
    }

    // ---- low-level cursor ----

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while !matches!(self.peek(), Some('\n') | None) {
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    while !self.at_end() && !(self.peek() == Some('*') && self.peek_at(1) == Some('/')) {
                        self.advance();
                    }
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn skip_inline_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c == ' ' || c == '\t') {
            self.advance();
        }
    }

    fn skip_to_eol(&mut self) {
        while !matches!(self.peek(), Some('\n') | None) {
            self.advance();
        }
    }

    fn read_to_eol(&mut self) -> String {
        let mut s = String::new();
        while !matches!(self.peek(), Some('\n') | None) {
            s.push(self.advance().unwrap());
        }
        s
    }

    fn match_word(&mut self, word: &str) -> bool {
        let save = self.pos;
        self.skip_trivia();
        for (i, expected) in word.chars().enumerate() {
            if self.peek_at(i) != Some(expected) {
                self.pos = save;
                return false;
            }
        }
        // Must not be a prefix of a longer identifier.
        if let Some(next) = self.peek_at(word.len()) {
            if is_ident_continue(next) {
                self.pos = save;
                return false;
            }
        }
        self.pos += word.len();
        true
    }

    fn read_ident(&mut self) -> String {
        let mut s = String::new();
        if self.peek().is_some_and(is_ident_start) {
            s.push(self.advance().unwrap());
            while self.peek().is_some_and(is_ident_continue) {
                s.push(self.advance().unwrap());
            }
        }
        s
    }

    fn read_const_int(&mut self) -> Option<i64> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        let mut s = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_hexdigit() || c == 'x' || c == 'X') {
            s.push(self.advance().unwrap());
        }
        parse_int_literal(&self.chars[start..self.pos].iter().collect::<String>())
    }

    fn skip_string_literal(&mut self) {
        if self.peek() != Some('"') {
            return;
        }
        self.advance();
        while let Some(c) = self.peek() {
            self.advance();
            if c == '\\' {
                self.advance();
            } else if c == '"' {
                break;
            }
        }
    }

    fn skip_balanced(&mut self, open: char, close: char) {
        if self.peek() != Some(open) {
            return;
        }
        let mut depth = 0usize;
        loop {
            match self.advance() {
                None => break,
                Some(c) if c == open => depth += 1,
                Some(c) if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Some('"') => {
                    self.pos -= 1;
                    self.skip_string_literal();
                }
                _ => {}
            }
        }
    }

    fn skip_to_semicolon_balanced(&mut self) {
        loop {
            self.skip_trivia();
            match self.peek() {
                None | Some(';') => {
                    self.advance();
                    break;
                }
                Some('{') => self.skip_balanced('{', '}'),
                Some('"') => self.skip_string_literal(),
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn skip_one_token(&mut self) {
        self.skip_trivia();
        if self.at_end() {
            return;
        }
        if self.peek().is_some_and(is_ident_start) {
            self.read_ident();
        } else if self.peek() == Some('"') {
            self.skip_string_literal();
        } else {
            self.advance();
        }
    }
}

fn base_type_from_ident(name: &str, unsigned: Option<bool>) -> CType {
    match name {
        "void" => CType::Void,
        "char" => match unsigned {
            Some(true) => CType::UChar,
            _ => CType::SChar,
        },
        "short" => {
            if unsigned == Some(true) {
                CType::UShort
            } else {
                CType::Short
            }
        }
        "int" => {
            if unsigned == Some(true) {
                CType::UInt
            } else {
                CType::Int
            }
        }
        "long" => {
            if unsigned == Some(true) {
                CType::ULong
            } else {
                CType::Long
            }
        }
        "float" => CType::Float,
        "double" => CType::Double,
        "bool" | "_Bool" => CType::Bool,
        "size_t" => CType::SizeT,
        "int8_t" => CType::I8,
        "uint8_t" => CType::U8,
        "int16_t" => CType::I16,
        "uint16_t" => CType::U16,
        "int32_t" => CType::I32,
        "uint32_t" => CType::U32,
        "int64_t" => CType::I64,
        "uint64_t" => CType::U64,
        // spec.md §9: unknown identifiers default to `int`, a documented
        // soundness hazard for typedef'd non-int parameters.
        _ => CType::Int,
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn parse_int_literal(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = s.strip_prefix("-0x").or_else(|| s.strip_prefix("-0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|v: i64| -v);
    }
    s.parse::<i64>().ok()
}

fn parse_macro_value(value: &str) -> MacroValue {
    if let Some(n) = parse_int_literal(value) {
        return MacroValue::Int(n);
    }
    if let Ok(f) = value.parse::<f64>() {
        return MacroValue::Float(f);
    }
    let trimmed = value.trim_matches('"').to_string();
    MacroValue::Str(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_define_int_and_float_and_string() {
        let h = parse_header("#define MAX_LEN 64\n#define PI 3.14\n#define NAME \"brisk\"\n");
        assert_eq!(h.macros[0], ("MAX_LEN".to_string(), MacroValue::Int(64)));
        assert_eq!(h.macros[1], ("PI".to_string(), MacroValue::Float(3.14)));
        assert_eq!(
            h.macros[2],
            ("NAME".to_string(), MacroValue::Str("brisk".to_string()))
        );
    }

    #[test]
    fn parses_hex_define() {
        let h = parse_header("#define FLAG 0x10\n");
        assert_eq!(h.macros[0], ("FLAG".to_string(), MacroValue::Int(16)));
    }

    #[test]
    fn skips_function_like_macro() {
        let h = parse_header("#define SQUARE(x) ((x)*(x))\n#define OK 1\n");
        assert_eq!(h.macros.len(), 1);
        assert_eq!(h.macros[0].0, "OK");
    }

    #[test]
    fn parses_enum_with_explicit_and_implicit_values() {
        let h = parse_header("enum Color { RED = 10, GREEN, BLUE = 20 };");
        assert_eq!(h.enumerators, vec![
            ("RED".to_string(), 10),
            ("GREEN".to_string(), 11),
            ("BLUE".to_string(), 20),
        ]);
    }

    #[test]
    fn parses_simple_function_declaration() {
        let h = parse_header("double sqrt(double x);");
        assert_eq!(h.functions.len(), 1);
        assert_eq!(h.functions[0].name, "sqrt");
        assert_eq!(h.functions[0].return_type, CType::Double);
        assert_eq!(h.functions[0].params, vec![CType::Double]);
        assert!(!h.functions[0].variadic);
    }

    #[test]
    fn recognizes_char_star_as_cstring() {
        let h = parse_header("int puts(const char *s);");
        assert_eq!(h.functions[0].params, vec![CType::CString]);
    }

    #[test]
    fn recognizes_void_param_list_and_variadic() {
        let h = parse_header("int rand(void);\nint printf(const char *fmt, ...);");
        assert_eq!(h.functions[0].params.len(), 0);
        assert!(h.functions[1].variadic);
    }

    #[test]
    fn skips_function_body() {
        let h = parse_header("static inline int add(int a, int b) { return a + b; }\nint next(void);");
        assert_eq!(h.functions.len(), 2);
        assert_eq!(h.functions[0].name, "add");
        assert_eq!(h.functions[1].name, "next");
    }

    #[test]
    fn skips_typedef_and_struct() {
        let h = parse_header("typedef struct { int x; int y; } Point;\nint f(void);");
        assert_eq!(h.functions.len(), 1);
        assert_eq!(h.functions[0].name, "f");
    }

    #[test]
    fn parses_named_struct_fields() {
        let h = parse_header("struct Vec2 { float x; float y; };");
        assert_eq!(h.structs.len(), 1);
        assert_eq!(h.structs[0].name, "Vec2");
        assert_eq!(
            h.structs[0].fields,
            vec![("x".to_string(), CType::Float), ("y".to_string(), CType::Float)]
        );
    }

    #[test]
    fn skips_gnu_attributes() {
        let h = parse_header(
            "int weird(int x) __attribute__((warn_unused_result));\nint ok(void);",
        );
        assert_eq!(h.functions.len(), 2);
        assert_eq!(h.functions[1].name, "ok");
    }

    #[test]
    fn handles_extern_c_block_without_treating_it_as_nested_scope() {
        let h = parse_header(r#"extern "C" {
int a(void);
int b(void);
}"#);
        assert_eq!(h.functions.len(), 2);
    }

    #[test]
    fn unknown_typedef_defaults_to_int() {
        let h = parse_header("MyHandle open_handle(void);");
        assert_eq!(h.functions[0].return_type, CType::Int);
    }
}
