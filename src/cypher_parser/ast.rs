use std::fmt;

/// A complete Cypher statement: a query plus any UNION continuations.
#[derive(Debug, PartialEq, Clone)]
pub struct CypherStatement<'a> {
    pub query: CypherQuery<'a>,
    pub unions: Vec<UnionClause<'a>>,
}

/// A UNION continuation combining a further query with what came before.
#[derive(Debug, PartialEq, Clone)]
pub struct UnionClause<'a> {
    /// UNION ALL keeps duplicates; plain UNION removes them.
    pub all: bool,
    pub query: CypherQuery<'a>,
}

/// One query: clauses in source order, collected into typed slots.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct CypherQuery<'a> {
    /// MATCH and OPTIONAL MATCH in the order written.
    pub reading_clauses: Vec<ReadingClause<'a>>,
    pub unwind_clauses: Vec<UnwindClause<'a>>,
    pub with_clause: Option<WithClause<'a>>,
    pub create_clauses: Vec<CreateClause<'a>>,
    pub merge_clauses: Vec<MergeClause<'a>>,
    pub set_clause: Option<SetClause<'a>>,
    pub delete_clause: Option<DeleteClause<'a>>,
    pub return_clause: Option<ReturnClause<'a>>,
    pub order_by_clause: Option<OrderByClause<'a>>,
    pub skip_clause: Option<SkipClause>,
    pub limit_clause: Option<LimitClause>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ReadingClause<'a> {
    Match(MatchClause<'a>),
    OptionalMatch(MatchClause<'a>),
}

impl<'a> ReadingClause<'a> {
    pub fn clause(&self) -> &MatchClause<'a> {
        match self {
            ReadingClause::Match(m) | ReadingClause::OptionalMatch(m) => m,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, ReadingClause::OptionalMatch(_))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct MatchClause<'a> {
    pub patterns: Vec<PathPattern<'a>>,
    pub where_clause: Option<WhereClause<'a>>,
}

/// UNWIND expr AS alias - expands a list into one row per element.
#[derive(Debug, PartialEq, Clone)]
pub struct UnwindClause<'a> {
    pub expression: Expression<'a>,
    pub alias: &'a str,
}

#[derive(Debug, PartialEq, Clone)]
pub struct CreateClause<'a> {
    pub patterns: Vec<PathPattern<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct MergeClause<'a> {
    pub pattern: PathPattern<'a>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SetClause<'a> {
    pub items: Vec<SetItem<'a>>,
}

/// `n.key = expr`
#[derive(Debug, PartialEq, Clone)]
pub struct SetItem<'a> {
    pub target: PropertyAccess<'a>,
    pub value: Expression<'a>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct DeleteClause<'a> {
    pub detach: bool,
    /// Variables being deleted.
    pub items: Vec<&'a str>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct WhereClause<'a> {
    pub condition: Expression<'a>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ReturnClause<'a> {
    pub distinct: bool,
    pub items: Vec<ReturnItem<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ReturnItem<'a> {
    pub expression: Expression<'a>,
    pub alias: Option<&'a str>,
    /// Original text of the expression, used as the output column name when
    /// no explicit AS alias is given.
    pub text: &'a str,
}

impl<'a> ReturnItem<'a> {
    /// The output column name for this item.
    pub fn column_name(&self) -> &'a str {
        self.alias.unwrap_or(self.text)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct WithClause<'a> {
    pub items: Vec<WithItem<'a>>,
    pub distinct: bool,
    pub order_by: Option<OrderByClause<'a>>,
    pub skip: Option<SkipClause>,
    pub limit: Option<LimitClause>,
    pub where_clause: Option<WhereClause<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct WithItem<'a> {
    pub expression: Expression<'a>,
    pub alias: Option<&'a str>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct OrderByClause<'a> {
    pub items: Vec<OrderByItem<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct OrderByItem<'a> {
    pub expression: Expression<'a>,
    pub order: SortOrder,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct SkipClause {
    pub count: i64,
}

#[derive(Debug, PartialEq, Clone)]
pub struct LimitClause {
    pub count: i64,
}

/// A path: a start node followed by zero or more relationship/node segments.
#[derive(Debug, PartialEq, Clone)]
pub struct PathPattern<'a> {
    pub start: NodePattern<'a>,
    pub segments: Vec<PathSegment<'a>>,
}

impl<'a> PathPattern<'a> {
    pub fn is_single_node(&self) -> bool {
        self.segments.is_empty()
    }

    /// Iterate every node pattern in the path, start first.
    pub fn nodes<'s>(&'s self) -> impl Iterator<Item = &'s NodePattern<'a>> + 's {
        std::iter::once(&self.start).chain(self.segments.iter().map(|s| &s.node))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct PathSegment<'a> {
    pub relationship: RelationshipPattern<'a>,
    pub node: NodePattern<'a>,
}

/// `(var:Label {key: value, ...})` - every part optional.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct NodePattern<'a> {
    pub variable: Option<&'a str>,
    pub label: Option<&'a str>,
    pub properties: Option<Vec<PropertyEntry<'a>>>,
}

/// `-[var:TYPE {props} *min..max]->` in any of the three directions.
#[derive(Debug, PartialEq, Clone)]
pub struct RelationshipPattern<'a> {
    pub variable: Option<&'a str>,
    pub rel_type: Option<&'a str>,
    pub direction: Direction,
    pub properties: Option<Vec<PropertyEntry<'a>>>,
    pub var_length: Option<VarLengthSpec>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Direction {
    /// `-[..]->`
    Outgoing,
    /// `<-[..]-`
    Incoming,
    /// `-[..]-`
    Either,
}

/// `*`, `*2`, `*1..3`, `*..5`, `*2..` - either bound optional.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct VarLengthSpec {
    pub min_hops: Option<u32>,
    pub max_hops: Option<u32>,
}

impl VarLengthSpec {
    /// Effective minimum, defaulting to 1.
    pub fn effective_min(&self) -> u32 {
        self.min_hops.unwrap_or(1)
    }

    /// Effective maximum, with the caller-supplied cap for unbounded specs.
    pub fn effective_max(&self, default_cap: u32) -> u32 {
        self.max_hops.unwrap_or(default_cap)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct PropertyEntry<'a> {
    pub key: &'a str,
    pub value: Expression<'a>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Unescaped content; `\n \t \" \' \\` are resolved during parsing.
    String(String),
    Null,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Operator {
    // binary
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    And,
    Or,
    In,
    // string predicates
    StartsWith,
    EndsWith,
    Contains,
    // unary
    Not,
    // postfix
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::LessThan
                | Operator::GreaterThan
                | Operator::LessThanEqual
                | Operator::GreaterThanEqual
        )
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct OperatorApplication<'a> {
    pub operator: Operator,
    pub operands: Vec<Expression<'a>>,
}

/// `var.key`
#[derive(Debug, PartialEq, Clone)]
pub struct PropertyAccess<'a> {
    pub base: &'a str,
    pub key: &'a str,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionCall<'a> {
    pub name: &'a str,
    pub args: Vec<Expression<'a>>,
    /// count(*)
    pub star: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub struct CaseExpression<'a> {
    /// Present for the simple form `CASE x WHEN ...`, absent for searched CASE.
    pub subject: Option<Box<Expression<'a>>>,
    pub when_then: Vec<(Expression<'a>, Expression<'a>)>,
    pub else_expr: Option<Box<Expression<'a>>>,
}

/// `[x IN list WHERE cond | projection]`
#[derive(Debug, PartialEq, Clone)]
pub struct ListComprehension<'a> {
    pub variable: &'a str,
    pub list: Expression<'a>,
    pub filter: Option<Expression<'a>>,
    pub projection: Option<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression<'a> {
    Literal(Literal),
    Variable(&'a str),
    /// `$name`
    Parameter(&'a str),
    List(Vec<Expression<'a>>),
    Map(Vec<(&'a str, Expression<'a>)>),
    PropertyAccess(PropertyAccess<'a>),
    FunctionCall(FunctionCall<'a>),
    Operator(OperatorApplication<'a>),
    Case(CaseExpression<'a>),
    ListComprehension(Box<ListComprehension<'a>>),
    /// `EXISTS((a)-[:T]->(b))`
    PatternExists(Box<PathPattern<'a>>),
}

impl fmt::Display for Expression<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
