//! Symbols and keywords used when terms and equations are prettyprinted.

// Symbols
//
//

/// The symbol `$`, prefix of bound arguments
pub const DOLLAR: &str = "$";

/// The symbol `#`, prefix of conglomerates
pub const HASH: &str = "#";

/// The symbol `?`, prefix of indeterminates
pub const HOLE: &str = "?";

/// The symbol `=?=`, separating the sides of an equation
pub const UNIFIES: &str = "=?=";

/// The symbol `:=`
pub const COLON_EQ: &str = ":=";

/// The symbol `:`
pub const COLON: &str = ":";

/// The symbol `~`, separating the sides of an assumption
pub const TILDE: &str = "~";

/// The symbol `@`, separating a name from its symbol id
pub const AT: &str = "@";

// Keywords
//
//

/// The keyword `Type`
pub const TYPE: &str = "Type";

/// The keyword `arrow`
pub const ARROW: &str = "arrow";

/// The keyword `Failed:`
pub const FAILED: &str = "Failed:";

/// The keyword `Stalled:`
pub const STALLED: &str = "Stalled:";

/// The keyword `Assuming:`
pub const ASSUMING: &str = "Assuming:";
