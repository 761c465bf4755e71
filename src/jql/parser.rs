//! JQL Parser
//!
//! This module parses JQL tokens into a query [`Plan`].
//!
//! Grammar:
//!
//! ```text
//! query     := table '.' call ('.' call)* EOF
//! call      := name '(' [arg (',' arg)*] ')'
//! condition := field operator value
//! field     := column | function '(' column ')'
//! value     := string | integer | float | true | false | null
//!            | :placeholder | function '(' value ')'
//! ```

use super::ast::*;
use super::lexer::Lexer;
use super::token::Token;
use crate::error::{Error, Result};
use crate::storage::Value;

/// JQL Parser
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a new parser from a JQL string
    pub fn new(query: &str) -> Result<Self> {
        let mut lexer = Lexer::new(query);
        let tokens = lexer.tokenize()?;

        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parse the query
    pub fn parse(&mut self) -> Result<Plan> {
        let table = match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                name
            }
            Token::Dot | Token::Eof => {
                return Err(Error::Parse("no table detected in the query".to_string()))
            }
            other => {
                return Err(Error::UnexpectedToken {
                    expected: "table name".to_string(),
                    found: other.to_string(),
                })
            }
        };

        if !self.check(&Token::Dot) {
            return Err(Error::Parse(format!(
                "expected an action after table '{}'",
                table
            )));
        }
        self.advance();

        let (action, params) = self.parse_action()?;

        let mut extensions: Vec<Extension> = Vec::new();
        let mut previous = action.name().to_string();
        while self.check(&Token::Dot) {
            self.advance();
            if matches!(self.current(), Token::Dot | Token::Eof) {
                return Err(Error::Parse(format!(
                    "unexpected '.' after extension '{}'",
                    previous
                )));
            }

            let name = self.expect_identifier()?;
            if !self.check(&Token::LParen) {
                return Err(Error::Parse(format!(
                    "there is an error at the extension '{}'",
                    name
                )));
            }
            self.advance();
            let extension = self.parse_extension(&name)?;
            self.expect(&Token::RParen)?;

            if !extension.is_repeatable()
                && extensions.iter().any(|e| e.name() == extension.name())
            {
                return Err(Error::Parse(format!(
                    "the '{}()' extension can only be used once",
                    extension.name()
                )));
            }
            previous = name;
            extensions.push(extension);
        }

        if !self.is_at_end() {
            return Err(Error::UnexpectedToken {
                expected: "'.' or end of query".to_string(),
                found: self.current().to_string(),
            });
        }

        Ok(Plan {
            table,
            action,
            params,
            extensions,
        })
    }

    // ========== Action ==========

    fn parse_action(&mut self) -> Result<(Action, Vec<Param>)> {
        let name = match self.current().clone() {
            Token::Identifier(name) => name,
            Token::Eof => return Err(Error::Parse("no action given".to_string())),
            other => return Err(Error::UnsupportedAction(other.to_string())),
        };
        let action: Action = name.parse()?;
        self.advance();

        if !self.check(&Token::LParen) {
            return Err(Error::Parse(format!(
                "there is an error at the action '{}'",
                name
            )));
        }
        self.advance();

        let params = if action.takes_values() {
            self.parse_list(|p| p.parse_value(false).map(Param::Value))?
        } else {
            self.parse_list(Self::parse_param)?
        };
        self.expect(&Token::RParen)?;

        Ok((action, params))
    }

    fn parse_param(&mut self) -> Result<Param> {
        match self.current().clone() {
            Token::Asterisk => {
                self.advance();
                Ok(Param::All)
            }
            Token::Identifier(name)
                if name.eq_ignore_ascii_case("last_insert_id")
                    && self.peek() != Some(&Token::LParen) =>
            {
                self.advance();
                Ok(Param::LastInsertId)
            }
            Token::Identifier(_) => self.parse_field().map(Param::Field),
            other => Err(Error::UnexpectedToken {
                expected: "column, '*' or function".to_string(),
                found: other.to_string(),
            }),
        }
    }

    // ========== Extensions ==========

    fn parse_extension(&mut self, name: &str) -> Result<Extension> {
        let extension = match name.to_ascii_lowercase().as_str() {
            "order" => {
                let args = self.parse_list(Self::parse_word)?;
                check_arity("order", "1 or 2", &args, 1..=2)?;
                let direction = match args.get(1) {
                    None => OrderDirection::Asc,
                    Some(d) if d.eq_ignore_ascii_case("asc") => OrderDirection::Asc,
                    Some(d) if d.eq_ignore_ascii_case("desc") => OrderDirection::Desc,
                    Some(d) => {
                        return Err(Error::Parse(format!(
                            "the second argument of 'order()' must be 'asc' or 'desc', got '{}'",
                            d
                        )))
                    }
                };
                let column = args.into_iter().next().unwrap_or_default();
                Extension::Order { column, direction }
            }
            "where" => {
                let conditions = self.parse_list(Self::parse_condition)?;
                check_arity("where", "at least 1", &conditions, 1..=usize::MAX)?;
                Extension::Where(conditions)
            }
            "and" => {
                let values = self.parse_list(|p| p.parse_value(false))?;
                check_arity("and", "at least 1", &values, 1..=usize::MAX)?;
                Extension::And(values)
            }
            "limit" => {
                let args = self.parse_list(Self::expect_count)?;
                let (offset, count) = match args.as_slice() {
                    [count] => (0, *count),
                    [offset, count] => (*offset, *count),
                    _ => {
                        return Err(Error::ExtensionArity {
                            extension: "limit".to_string(),
                            expected: "1 or 2".to_string(),
                            found: args.len(),
                        })
                    }
                };
                Extension::Limit { offset, count }
            }
            "in" => {
                let columns = self.parse_list(Self::parse_word)?;
                check_arity("in", "at least 1", &columns, 1..=usize::MAX)?;
                Extension::In(columns)
            }
            "with" => {
                let values = self.parse_list(|p| p.parse_value(false))?;
                check_arity("with", "at least 1", &values, 1..=usize::MAX)?;
                Extension::With(values)
            }
            "as" => {
                let aliases = self.parse_list(Self::parse_word)?;
                check_arity("as", "at least 1", &aliases, 1..=usize::MAX)?;
                Extension::As(aliases)
            }
            "group" => {
                let columns = self.parse_list(Self::parse_word)?;
                check_arity("group", "1", &columns, 1..=1)?;
                Extension::Group(columns.into_iter().next().unwrap_or_default())
            }
            "on" => {
                let columns = self.parse_list(Self::parse_word)?;
                check_arity("on", "1", &columns, 1..=1)?;
                Extension::On(columns.into_iter().next().unwrap_or_default())
            }
            "link" => {
                let columns = self.parse_list(|p| {
                    if p.check(&Token::Asterisk) {
                        p.advance();
                        Ok("*".to_string())
                    } else {
                        p.parse_word()
                    }
                })?;
                check_arity("link", "at least 1", &columns, 1..=usize::MAX)?;
                Extension::Link(columns)
            }
            _ => {
                return Err(Error::Parse(format!(
                    "the extension '{}()' is not supported",
                    name
                )))
            }
        };

        Ok(extension)
    }

    fn parse_condition(&mut self) -> Result<Condition> {
        let field = self.parse_field()?;

        let operator = match self.current().clone() {
            Token::Operator(op) => {
                self.advance();
                op
            }
            other => {
                return Err(Error::UnexpectedToken {
                    expected: "operator".to_string(),
                    found: other.to_string(),
                })
            }
        };

        let value = self.parse_value(true)?;

        Ok(Condition {
            field,
            operator,
            value,
        })
    }

    // ========== Fields and Values ==========

    /// `column` or `function(column)`
    fn parse_field(&mut self) -> Result<FieldRef> {
        let name = self.expect_identifier()?;
        if !self.check(&Token::LParen) {
            return Ok(FieldRef::column(name));
        }

        let function = lookup_function(&name)?;
        self.advance();
        let column = self.expect_identifier()?;
        self.expect_single_argument(function)?;
        Ok(FieldRef::function(function, column))
    }

    fn parse_value(&mut self, allow_last_insert_id: bool) -> Result<Literal> {
        let literal = match self.current().clone() {
            Token::StringLiteral(s) => Literal::Value(Value::String(s)),
            Token::IntegerLiteral(n) => Literal::Value(Value::Integer(n)),
            Token::FloatLiteral(n) => Literal::Value(Value::Float(n)),
            Token::Placeholder(name) => Literal::Placeholder(name),
            Token::Identifier(name) if self.peek() == Some(&Token::LParen) => {
                let function = lookup_function(&name)?;
                self.advance();
                self.advance();
                if self.check(&Token::RParen) {
                    return Err(Error::Parse(format!(
                        "the function '{}()' needs one argument",
                        function.name()
                    )));
                }
                let argument = self.parse_value(allow_last_insert_id)?;
                self.expect_single_argument(function)?;
                return Ok(Literal::Function {
                    function,
                    argument: Box::new(argument),
                });
            }
            Token::Identifier(name) => match name.to_ascii_lowercase().as_str() {
                "true" => Literal::Value(Value::Boolean(true)),
                "false" => Literal::Value(Value::Boolean(false)),
                "null" => Literal::Value(Value::Null),
                "last_insert_id" if allow_last_insert_id => Literal::LastInsertId,
                _ => {
                    return Err(Error::Parse(format!(
                        "'{}' is not a valid value, quote strings with '...'",
                        name
                    )))
                }
            },
            other => {
                return Err(Error::UnexpectedToken {
                    expected: "value".to_string(),
                    found: other.to_string(),
                })
            }
        };
        self.advance();
        Ok(literal)
    }

    // ========== Helper functions ==========

    /// Parse a possibly empty comma-separated list ending before `)`
    fn parse_list<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let mut items = Vec::new();
        if self.check(&Token::RParen) {
            return Ok(items);
        }

        loop {
            items.push(item(self)?);

            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }

        Ok(items)
    }

    /// Identifier or quoted name
    fn parse_word(&mut self) -> Result<String> {
        match self.current().clone() {
            Token::Identifier(name) | Token::StringLiteral(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(Error::UnexpectedToken {
                expected: "identifier".to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn expect_single_argument(&mut self, function: ScalarFunction) -> Result<()> {
        if self.check(&Token::Comma) {
            return Err(Error::Parse(format!(
                "the function '{}()' takes exactly one argument",
                function.name()
            )));
        }
        self.expect(&Token::RParen)
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position + 1)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(token)
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.check(token) {
            self.advance();
            Ok(())
        } else {
            Err(Error::UnexpectedToken {
                expected: format!("'{}'", token),
                found: format!("{}", self.current()),
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(Error::UnexpectedToken {
                expected: "identifier".to_string(),
                found: format!("{}", self.current()),
            }),
        }
    }

    fn expect_count(&mut self) -> Result<usize> {
        match self.current().clone() {
            Token::IntegerLiteral(n) if n >= 0 => {
                self.advance();
                Ok(n as usize)
            }
            _ => Err(Error::UnexpectedToken {
                expected: "non-negative integer".to_string(),
                found: format!("{}", self.current()),
            }),
        }
    }
}

fn lookup_function(name: &str) -> Result<ScalarFunction> {
    ScalarFunction::from_name(name).ok_or_else(|| {
        Error::Parse(format!("the function '{}()' is not implemented in JQL", name))
    })
}

fn check_arity<T>(
    extension: &str,
    expected: &str,
    args: &[T],
    allowed: std::ops::RangeInclusive<usize>,
) -> Result<()> {
    if allowed.contains(&args.len()) {
        Ok(())
    } else {
        Err(Error::ExtensionArity {
            extension: extension.to_string(),
            expected: expected.to_string(),
            found: args.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> Result<Plan> {
        Parser::new(query)?.parse()
    }

    #[test]
    fn test_parse_simple_select() {
        let plan = parse("users.select(*)").unwrap();

        assert_eq!(plan.table, "users");
        assert_eq!(plan.action, Action::Select);
        assert_eq!(plan.params, vec![Param::All]);
        assert!(plan.extensions.is_empty());
    }

    #[test]
    fn test_parse_select_with_extensions() {
        let plan = parse(
            "users.SELECT(name, md5(pass)).where(age >= 18, name != 'bob').where(id = last_insert_id).order(age, desc).limit(2, 5).as(n, null)",
        )
        .unwrap();

        assert_eq!(
            plan.params,
            vec![
                Param::Field(FieldRef::column("name")),
                Param::Field(FieldRef::function(ScalarFunction::Md5, "pass")),
            ]
        );

        let groups = plan.where_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0].operator, ">=");
        assert_eq!(groups[0][1].value, Literal::Value(Value::from("bob")));
        assert_eq!(groups[1][0].value, Literal::LastInsertId);

        assert_eq!(plan.order(), Some(("age", OrderDirection::Desc)));
        assert_eq!(plan.limit(), Some((2, 5)));
        assert_eq!(
            plan.aliases(),
            Some(&["n".to_string(), "null".to_string()][..])
        );
    }

    #[test]
    fn test_parse_insert_values() {
        let plan = parse(
            r"users.insert('it\'s', -3, 2.5, TRUE, null, sha1('x')).and('b', 1, 0.5, false, null, :p).in(a, b, c, d, e, f)",
        )
        .unwrap();

        assert_eq!(plan.action, Action::Insert);
        assert_eq!(plan.params.len(), 6);
        assert_eq!(plan.params[0], Param::Value(Literal::Value(Value::from("it's"))));
        assert_eq!(plan.params[1], Param::Value(Literal::Value(Value::Integer(-3))));
        assert_eq!(plan.params[2], Param::Value(Literal::Value(Value::Float(2.5))));
        assert_eq!(plan.params[3], Param::Value(Literal::Value(Value::Boolean(true))));
        assert_eq!(plan.params[4], Param::Value(Literal::Value(Value::Null)));
        assert!(matches!(
            &plan.params[5],
            Param::Value(Literal::Function { function: ScalarFunction::Sha1, .. })
        ));
        assert_eq!(plan.and_batches().len(), 1);
        assert_eq!(plan.in_columns().map(|c| c.len()), Some(6));
        assert_eq!(plan.placeholders(), vec!["p"]);
    }

    #[test]
    fn test_parse_joins() {
        let plan = parse("orders.select(id, customer).on(customer).link(name, *)").unwrap();
        assert_eq!(plan.on_columns(), vec!["customer"]);
        assert_eq!(plan.link_columns(), vec![&["name".to_string(), "*".to_string()][..]]);
    }

    #[test]
    fn test_missing_table() {
        assert!(matches!(parse(".select(*)"), Err(Error::Parse(_))));
        assert!(matches!(parse(""), Err(Error::Parse(_))));
    }

    #[test]
    fn test_unsupported_action() {
        assert!(matches!(
            parse("users.drop()"),
            Err(Error::UnsupportedAction(a)) if a == "drop"
        ));
    }

    #[test]
    fn test_malformed_segments() {
        assert!(matches!(parse("users.select(*)."), Err(Error::Parse(_))));
        assert!(matches!(parse("users.select(*).where"), Err(Error::Parse(_))));
        assert!(matches!(parse("users.select(*).sort(a)"), Err(Error::Parse(_))));
        assert!(matches!(parse("users.select"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_extension_arity() {
        assert!(matches!(
            parse("users.select(*).limit(1, 2, 3)"),
            Err(Error::ExtensionArity { found: 3, .. })
        ));
        assert!(matches!(
            parse("users.count(*).group(a, b)"),
            Err(Error::ExtensionArity { found: 2, .. })
        ));
        assert!(matches!(
            parse("users.select(*).where()"),
            Err(Error::ExtensionArity { found: 0, .. })
        ));
    }

    #[test]
    fn test_repeated_and_invalid_extensions() {
        assert!(matches!(
            parse("users.select(*).limit(1).limit(2)"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse("users.select(*).order(a, up)"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_operator_kept_raw() {
        let plan = parse("users.select(*).where(a => 1)").unwrap();
        assert_eq!(plan.where_groups()[0][0].operator, "=>");
    }

    #[test]
    fn test_bare_word_value_rejected() {
        assert!(matches!(
            parse("users.insert(hello)"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse("users.insert(last_insert_id)"),
            Err(Error::Parse(_))
        ));
    }
}
