//! The operators of the content stream grammar.

/// Every operator defined for content streams, sorted by byte value.
const KNOWN_OPERATORS: &[&[u8]] = &[
    b"\"", b"'", b"B", b"B*", b"BDC", b"BI", b"BMC", b"BT", b"BX", b"CS", b"DP", b"Do",
    b"EI", b"EMC", b"ET", b"EX", b"F", b"G", b"ID", b"J", b"K", b"M", b"MP", b"Q", b"RG", b"S",
    b"SC", b"SCN", b"T*", b"TD", b"TJ", b"TL", b"Tc", b"Td", b"Tf", b"Tj", b"Tm", b"Tr", b"Ts",
    b"Tw", b"Tz", b"W", b"W*", b"b", b"b*", b"c", b"cm", b"cs", b"d", b"d0", b"d1", b"f", b"f*",
    b"g", b"gs", b"h", b"i", b"j", b"k", b"l", b"m", b"n", b"q", b"re", b"rg", b"ri", b"s",
    b"sc", b"scn", b"sh", b"v", b"w", b"y",
];

/// Whether `op` is a content stream operator.
pub fn is_known_operator(op: &[u8]) -> bool {
    KNOWN_OPERATORS.binary_search(&op).is_ok()
}
