//! 内置规则库
//! 通用参数黑名单 + 少量特定网域规则，启动时编译一次，之后只读

use std::collections::HashSet;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::compiler::{GeneralRules, RuleCompiler, RuleSet, RuleSource};

// 通用字面参数（所有网站都套用）
const GENERAL_LITERAL_PARAMS: &[&str] = &[
    // 各平台 Click ID
    "yclid", "fbclid", "gclid", "dclid", "msclkid", "twclid", "igshid", "mibextid", "hl",
    // Google
    "ved", "ei", "gs_l", "gs_lcp", "sclient", "sxsrf", "rlz", "ICID",
    // Amazon
    "tag", "ascsubtag", "ref_", "psc", "linkCode", "linkId", "camp", "creative",
    // YouTube
    "si",
    // 淘宝
    "sku_properties", "priceTId", "abbucket", "xxc", "mi_id",
    "initiative_id", "clientPreloadId", "preLoadOrigin", "sourceId", "ssid", "suggest_query", "wq",
    // 邮件营销
    "mc_cid", "mc_eid", "mkt_tok", "nr_email_referer", "vero_conv", "vero_id",
    // 其他
    "trk", "trkCampaign", "oly_anon_id", "oly_enc_id", "otc", "__s", "wickedid", "dicbo", "spm", "scm",
    "ref", "ref_src", "ref_url", "src", "referrer", "origin_source",
    "xmt", "slof", "referral_code", "referral_story_type", "tracking", "hoisted_section_header_type",
    "rdid", "srsltid", "idorvanity", "set",
];

// 通用前缀（区分大小写）
const GENERAL_PREFIXES: &[&str] = &[
    "utm_", "ga_", "sc_", "from_", "edn_", "fb_", "hmb_", "pf_rd_", "pd_rd_", "ali_", "mm_",
];

/// 内置站点规则：(名称, 域名正则, 例外正则, 参数)
/// 只收录太通用、放进通用规则会误杀的参数
const SITE_RULES: &[(&str, &str, &[&str], &[&str])] = &[
    (
        "google",
        r"^https?://(?:[a-z0-9-]+\.)*?google(?:\.[a-z]{2,}){1,}",
        &[r"^https?://mail\.google\.com/"],
        &["source"],
    ),
    (
        "facebook",
        r"^https?://(?:[a-z0-9-]+\.)*?facebook\.com",
        &[],
        &["action_history", "action_type_map", "action_ref_map", "share_url", "type"],
    ),
    (
        "twitter",
        r"^https?://(?:[a-z0-9-]+\.)*?(?:twitter\.com|x\.com)",
        &[],
        &["s", "t"],
    ),
    (
        "youtube",
        r"^https?://(?:[a-z0-9-]+\.)*?youtube\.com",
        &[r"^https?://(?:[a-z0-9-]+\.)*?youtube\.com/redirect"],
        &["feature", "kw", "pp"],
    ),
    (
        "taobao",
        r"^https?://(?:[a-z0-9-]+\.)*?(?:taobao\.com|tmall\.com|tmall\.hk)",
        &[],
        &["ns", "source"],
    ),
    (
        "shopee",
        r"^https?://(?:[a-z0-9-]+\.)*?shopee\.[a-z.]+",
        &[],
        &["seoName"],
    ),
    (
        "trip",
        r"^https?://(?:[a-z0-9-]+\.)*?trip\.com",
        &[],
        &[
            "cityEnName", "cityId", "ages", "barcurr", "mincurr", "minprice",
            "fgt", "subStamp", "isCT", "isFlexible", "isFirstEnterDetail",
            "hoteluniquekey", "masterhotelid_tracelogid",
            "detailFilters", "hotelType", "display",
            "roomkey", "roomToken", "msr", "mproom",
            "trip_sub1", "hasAidInUrl",
        ],
    ),
];

static BUILTIN_STORE: Lazy<RuleStore> = Lazy::new(RuleStore::new);

/// 内置规则库
#[derive(Debug, Clone)]
pub struct RuleStore {
    general: GeneralRules,
    site_rules: Vec<RuleSet>,
}

impl RuleStore {
    /// 编译内置规则
    pub fn new() -> Self {
        let general = GeneralRules {
            literal_params: GENERAL_LITERAL_PARAMS.iter().map(|p| p.to_string()).collect::<HashSet<_>>(),
            prefix_patterns: GENERAL_PREFIXES
                .iter()
                .filter_map(|prefix| match RuleCompiler::compile_prefix(prefix) {
                    Ok(regex) => Some(regex),
                    Err(e) => {
                        warn!("通用前缀 {} 已丢弃：{}", prefix, e);
                        None
                    }
                })
                .collect(),
        };

        let sources: Vec<RuleSource> = SITE_RULES
            .iter()
            .map(|(name, pattern, exceptions, params)| RuleSource {
                name: name.to_string(),
                domain_pattern: pattern.to_string(),
                exceptions: exceptions.iter().map(|e| e.to_string()).collect(),
                rules: params.iter().map(|p| p.to_string()).collect(),
            })
            .collect();
        let site_rules = RuleCompiler::compile_batch(&sources);

        debug!(
            "内置规则编译完成：通用参数{}条、通用前缀{}条、站点规则{}个",
            general.literal_params.len(),
            general.prefix_patterns.len(),
            site_rules.len()
        );

        Self { general, site_rules }
    }

    /// 自定义规则库（嵌入方/测试使用）
    pub fn with_rules(general: GeneralRules, site_rules: Vec<RuleSet>) -> Self {
        Self { general, site_rules }
    }

    /// 进程级共享的内置规则库
    pub fn builtin() -> &'static RuleStore {
        &BUILTIN_STORE
    }

    pub fn general(&self) -> &GeneralRules {
        &self.general
    }

    pub fn site_rules(&self) -> &[RuleSet] {
        &self.site_rules
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}
