//! Built-in administrative region presets (province → city → district).
//!
//! Codes follow the GB/T 2260 six-digit scheme. Only the regions sales
//! teams commonly work in carry city and district entries; the rest are
//! listed at province level and can be extended through the API.

/// A preset region entry: `(code, name, parent_code)`.
pub type RegionPreset = (&'static str, &'static str, Option<&'static str>);

const PROVINCES: &[(&str, &str)] = &[
    ("110000", "北京市"),
    ("120000", "天津市"),
    ("130000", "河北省"),
    ("140000", "山西省"),
    ("150000", "内蒙古自治区"),
    ("210000", "辽宁省"),
    ("220000", "吉林省"),
    ("230000", "黑龙江省"),
    ("310000", "上海市"),
    ("320000", "江苏省"),
    ("330000", "浙江省"),
    ("340000", "安徽省"),
    ("350000", "福建省"),
    ("360000", "江西省"),
    ("370000", "山东省"),
    ("410000", "河南省"),
    ("420000", "湖北省"),
    ("430000", "湖南省"),
    ("440000", "广东省"),
    ("450000", "广西壮族自治区"),
    ("460000", "海南省"),
    ("500000", "重庆市"),
    ("510000", "四川省"),
    ("520000", "贵州省"),
    ("530000", "云南省"),
    ("540000", "西藏自治区"),
    ("610000", "陕西省"),
    ("620000", "甘肃省"),
    ("630000", "青海省"),
    ("640000", "宁夏回族自治区"),
    ("650000", "新疆维吾尔自治区"),
];

const CITIES: &[(&str, &str, &str)] = &[
    ("110100", "北京市辖区", "110000"),
    ("310100", "上海市辖区", "310000"),
    ("320100", "南京市", "320000"),
    ("320200", "无锡市", "320000"),
    ("320500", "苏州市", "320000"),
    ("330100", "杭州市", "330000"),
    ("330200", "宁波市", "330000"),
    ("370100", "济南市", "370000"),
    ("370200", "青岛市", "370000"),
    ("440100", "广州市", "440000"),
    ("440300", "深圳市", "440000"),
    ("441900", "东莞市", "440000"),
    ("510100", "成都市", "510000"),
    ("420100", "武汉市", "420000"),
];

const DISTRICTS: &[(&str, &str, &str)] = &[
    ("110105", "朝阳区", "110100"),
    ("110108", "海淀区", "110100"),
    ("310115", "浦东新区", "310100"),
    ("310112", "闵行区", "310100"),
    ("320505", "虎丘区", "320500"),
    ("320506", "吴中区", "320500"),
    ("330106", "西湖区", "330100"),
    ("330110", "余杭区", "330100"),
    ("440305", "南山区", "440300"),
    ("440306", "宝安区", "440300"),
    ("440106", "天河区", "440100"),
];

/// All preset regions ordered parents-first, so they can be inserted in
/// sequence without violating the parent lookup.
pub fn preset_regions() -> Vec<RegionPreset> {
    let mut out: Vec<RegionPreset> = PROVINCES
        .iter()
        .map(|(code, name)| (*code, *name, None))
        .collect();
    out.extend(CITIES.iter().map(|(c, n, p)| (*c, *n, Some(*p))));
    out.extend(DISTRICTS.iter().map(|(c, n, p)| (*c, *n, Some(*p))));
    out
}

/// 区划最深层级：省 → 市 → 区县
pub const MAX_REGION_LEVEL: i32 = 3;

/// Level of a preset region, derived from how deep its parent chain goes.
pub fn preset_level(parent_code: Option<&str>) -> i32 {
    match parent_code {
        None => 1,
        Some(p) if PROVINCES.iter().any(|(c, _)| *c == p) => 2,
        Some(_) => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn presets_are_parents_first_and_unique() {
        let mut seen = HashSet::new();
        for (code, _, parent) in preset_regions() {
            if let Some(p) = parent {
                assert!(seen.contains(p), "parent {p} of {code} should come first");
            }
            assert!(seen.insert(code), "duplicate region code {code}");
        }
    }

    #[test]
    fn preset_levels() {
        assert_eq!(preset_level(None), 1);
        assert_eq!(preset_level(Some("440000")), 2);
        assert_eq!(preset_level(Some("440300")), 3);
    }
}
