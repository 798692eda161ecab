//! Detection pattern library.
//!
//! Every detector is a single case-insensitive regular expression assembled
//! from the shared special-character fragments below. Each fragment matches
//! the raw character together with its URL-encoded (and, where attackers use
//! it, double-encoded) spellings.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

const MINUS: &str = r"(?:-|%2D|%252D)";
const LT: &str = r"(?:<|%3C|%253C|&lt;?|&#0*60;?|&#x0*3c;?|\\u003c|\\x3c)";
const DOT: &str = r"(?:\.|%2E|%252E|%C0%2E|%C0%AE|%E0%80%AE|\\u002e)";
const SLASH: &str = r"(?:/|\\|%2F|%5C|%252F|%255C|%C0%AF|%E0%80%AF|%C1%9C|%C0%5C|\\u002f)";
const PERCENT: &str = r"(?:%|%25)";
const QUOTE: &str = r#"(?:"|%22|%2522|&quot;?|\\u0022)"#;
const SINGLE_QUOTE: &str = r"(?:'|%27|%2527|&#0*39;?|\\u0027)";
const CURLY_OPEN: &str = r"(?:\{|%7B|%257B)";
const SQUARE_OPEN: &str = r"(?:\[|%5B|%255B)";
const SQUARE_CLOSE: &str = r"(?:\]|%5D|%255D)";
const PAREN_OPEN: &str = r"(?:\(|%28|%2528)";
const DOLLAR: &str = r"(?:\$|%24|%2524)";
const COLON: &str = r"(?::|%3A|%253A)";
const UNDERSCORE: &str = r"(?:_|%5F|%255F)";
const OR: &str = r"(?:\||%7C|%257C)";
const AND: &str = r"(?:&|%26|%2526)";
const EQUALS: &str = r"(?:=|%3D|%253D)";
const EXCLAMATION: &str = r"(?:!|%21|%2521)";
const SEMICOLON: &str = r"(?:;|%3B|%253B)";
const GAP: &str = r"(?:\s|\+|%20|%09|%0A|%0D|/\*.*?\*/)+";

const PATTERN_SIZE_LIMIT: usize = 32 * (1 << 20);

fn compile(name: &str, pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .unwrap_or_else(|e| panic!("invalid {name} pattern: {e}"))
}

pub(crate) static BAD_BOTS: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        "bad-bots",
        r"(?:sqlmap|nikto|nmap|masscan|zgrab|acunetix|netsparker|nessus|openvas|w3af|arachni|skipfish|wpscan|joomscan|dirbuster|dirb/|gobuster|feroxbuster|ffuf|wfuzz|nuclei|havij|zmeu|morfeus|jorgee|fimap|commix|xsser|whatweb|webshag|paros|hydra|brutus|httrack|emailcollector|emailsiphon|webzip|webcopier|sitesucker|blackwidow|webstripper|offline explorer|internet ninja|mj12bot|ahrefsbot|semrushbot|dotbot|blexbot|petalbot|megaindex|seokicks|linkdexbot|dataforseobot|serpstatbot|zoominfobot|barkrowler|python-urllib|libwww-perl|go-http-client|winhttp|indy library)",
    )
});

pub(crate) static CRLF_INJECTION: LazyLock<Regex> = LazyLock::new(|| {
    let newline = r"(?:\r|%0D|%E5%98%8D|\\u560d|%250D|\n|%0A|%E5%98%8A|\\u560a|%250A)";
    let header = format!(
        "(?:Set{MINUS}Cookie|Content{MINUS}(?:Length|Type|Location|Disposition|Security{MINUS}Policy)|X{MINUS}XSS{MINUS}Protection|Last{MINUS}Modified|Location|Date|Link|Refresh|{LT})"
    );
    compile("clrf-injection", &format!("{newline}{header}"))
});

pub(crate) static DIRECTORY_TRAVERSAL: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = [
        format!("{DOT}{{2,3}}{SEMICOLON}?{SLASH}"),
        format!("{SLASH}{SEMICOLON}?{DOT}{{2,3}}"),
        format!(
            "{SLASH}(?:etc|proc|home|run|var|usr|root|bin|cgi{MINUS}bin|windows|system32){SLASH}"
        ),
        format!("c{COLON}{SLASH}"),
        format!("{SLASH}{DOT}{SLASH}"),
        format!("boot{DOT}ini"),
        format!("{DOT}htaccess"),
        format!("(?:file|zip|php|data|phar|expect).{SLASH}{{2}}"),
        format!("{PERCENT}systemroot{PERCENT}"),
    ]
    .join("|");
    compile("directory-traversal", &pattern)
});

pub(crate) static NOSQL_INJECTION: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = [
        format!(
            r"(?:{SQUARE_OPEN}|{CURLY_OPEN}(?:{QUOTE}|{SINGLE_QUOTE})?\s*){DOLLAR}\S+(?:{COLON}|{SQUARE_CLOSE})"
        ),
        format!(
            "{DOLLAR}(?:where|n?or|and|not|regex|eq|ne|gte?|lte?|n?in|exists|comment|expr|mod|size|rand)"
        ),
        format!(
            r"db{DOT}\S+{DOT}(?:find|findOne|insert|update|insertOne|insertMany|updateMany|updateOne|delete|deleteOne|deleteMany|drop|count){PAREN_OPEN}"
        ),
        format!("sleep{PAREN_OPEN}"),
        format!("db{DOT}(?:getCollectionNames|dropDatabase){PAREN_OPEN}"),
        format!("{UNDERSCORE}all{UNDERSCORE}docs"),
        format!(r"this{DOT}\S+{DOT}match{PAREN_OPEN}"),
        format!(r"new\sDate{PAREN_OPEN}"),
        format!(r"{OR}{{2}}\s+\d{EQUALS}{{2}}\d"),
        format!(r"{AND}{{2}}\s+this{DOT}"),
    ]
    .join("|");
    compile("nosql-injection", &pattern)
});

pub(crate) static PROTOTYPE_POLLUTION: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = [
        format!("{UNDERSCORE}{UNDERSCORE}proto{UNDERSCORE}{UNDERSCORE}"),
        format!(r"\S{DOT}prototype(?:{DOT}|{SQUARE_OPEN})"),
        format!("{SQUARE_OPEN}prototype{SQUARE_CLOSE}"),
    ]
    .join("|");
    compile("prototype-pollution", &pattern)
});

pub(crate) static SQL_INJECTION: LazyLock<Regex> = LazyLock::new(|| {
    let quote = format!("(?:{QUOTE}|{SINGLE_QUOTE})");
    let pattern = [
        format!(
            r"(?:{quote}|\d|\))(?:{GAP})?(?:or|and|xor|{OR}{{2}}|{AND}{{2}})(?:{GAP}{quote}?|{quote})\w+{quote}?(?:{GAP})?(?:{EQUALS}|<|>|like\b)"
        ),
        format!(r"\bunion{GAP}(?:(?:all|distinct){GAP})?select\b"),
        format!(
            r"{SEMICOLON}\s*(?:drop|alter|create|truncate|shutdown|exec|insert|update|delete|select|declare)\b"
        ),
        format!(
            r"\b(?:insert{GAP}into|delete{GAP}from|drop{GAP}(?:table|database|schema)|truncate{GAP}table|alter{GAP}table)\b"
        ),
        format!(r"{quote}\s*(?:--|#|/\*)"),
        format!(r"{EQUALS}(?:{GAP})?{quote}?\w+{quote}?(?:{GAP})?(?:--|/\*)"),
        format!(r"\b(?:sleep|benchmark|pg_sleep)\s*{PAREN_OPEN}\s*\d"),
        format!(r"\bwaitfor{GAP}delay\b"),
        r"\binformation_schema\b".to_string(),
        r"\b(?:xp_cmdshell|sp_executesql|sp_oacreate)\b".to_string(),
        format!(r"\binto{GAP}(?:out|dump)file\b"),
        format!(r"\bload_file\s*{PAREN_OPEN}"),
        r"@@version".to_string(),
        format!(r"\b(?:char|chr|concat|group_concat)\s*{PAREN_OPEN}\s*(?:\d|0x)"),
    ]
    .join("|");
    compile("sql-injection", &pattern)
});

pub(crate) static XML_INJECTION: LazyLock<Regex> = LazyLock::new(|| {
    let quote = format!("(?:{QUOTE}|{SINGLE_QUOTE})");
    let pattern = [
        format!(r"{LT}{EXCLAMATION}ENTITY.*(?:SYSTEM|PUBLIC).*{quote}\w+{COLON}//"),
        format!("{LT}xi{COLON}include"),
        format!(
            "{LT}xsl{COLON}(?:value{MINUS}of|copy{MINUS}of).*{quote}(?:system{MINUS}property|document){PAREN_OPEN}"
        ),
        format!("{LT}msxsl{COLON}script"),
    ]
    .join("|");
    compile("xml-injection", &pattern)
});

pub(crate) static XSS: LazyLock<Regex> = LazyLock::new(|| {
    let events = r"on(?:error|load|unload|beforeunload|click|dblclick|contextmenu|mouse\w+|pointer\w+|touch\w+|key\w+|focus\w*|blur|submit|reset|change|input|select|abort|animation\w+|transition\w+|begin|end|toggle|wheel|scroll|resize|drag\w*|drop|copy|cut|paste|play|pause|message|hashchange|pageshow|popstate|show|start|finish|auxclick|search)";
    let pattern = [
        format!(
            r"{LT}\s*/?\s*(?:script|iframe|frame|frameset|object|embed|applet|svg|math|base|link|meta|style|form|isindex|marquee|details|video|audio|img|image|body|input|textarea|button|xss)\b"
        ),
        format!(r#"(?:^|[\s"'`/;+]|%20|%22|%27|%2F){events}\s*{EQUALS}"#),
        format!(r"(?:java|vb|live)script\s*{COLON}"),
        format!(r"data\s*{COLON}\s*text{SLASH}html"),
        format!(r"expression\s*{PAREN_OPEN}"),
        format!(r"document\s*{DOT}\s*(?:cookie|domain|write|location)"),
        format!(r"window\s*{DOT}\s*location"),
        format!(r"\b(?:alert|prompt|confirm|eval)\s*(?:{PAREN_OPEN}|`)"),
        format!(r"srcdoc\s*{EQUALS}"),
    ]
    .join("|");
    compile("xss", &pattern)
});
