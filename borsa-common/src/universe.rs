//! Default BIST symbol universe.
//!
//! Plain tickers without the exchange suffix; the market data adapter appends
//! it when building requests.

/// Symbols screened when the configuration does not list its own.
pub const BIST_SYMBOLS: &[&str] = &[
    "A1CAP", "ACSEL", "ADEL", "ADESE", "ADGYO", "AEFES", "AFYON", "AGESA", "AGHOL", "AGROT",
    "AGYO", "AHGAZ", "AHSGY", "AKBNK", "AKCNS", "AKENR", "AKFGY", "AKFYE", "AKGRT", "AKMGY",
    "AKSEN", "AKSGY", "AKSUE", "AKYHO", "ALARK", "ALBRK", "ALCAR", "ALCTL", "ALFAS", "ALKA",
    "ALKIM", "ALKLC", "ALMAD", "ALTNY", "ALVES", "ANELE", "ANGEN", "ANHYT", "ANSGR", "ARCLK",
    "ARDYZ", "ARENA", "ARSAN", "ARTMS", "ARZUM", "ASELS", "ASGYO", "ASTOR", "ATAGY", "ATAKP",
    "ATATP", "ATEKS", "ATLAS", "ATSYH", "AVGYO", "AVHOL", "AVOD", "AVPGY", "AVTUR", "AYCES",
    "AYDEM", "AYEN", "AYES", "AYGAZ", "AZTEK", "BAGFS", "BAHKM", "BAKAB", "BALAT", "BANVT",
    "BARMA", "BASCM", "BASGZ", "BAYRK", "BEGYO", "BEYAZ", "BFREN", "BIENY", "BIGCH", "BIMAS",
    "BINHO", "BIOEN", "BIZIM", "BJKAS", "BLCYT", "BMSCH", "BMSTL", "BNTAS", "BOBET", "BORLS",
    "BORSK", "BOSSA", "BRISA", "BRKSN", "BRKVY", "BRLSM", "BRMEN", "BRYAT", "BSOKE", "BTCIM",
    "BUCIM", "BURCE", "BURVA", "BVSAN", "BYDNR", "CANTE", "CASA", "CATES", "CCOLA", "CELHA",
    "CEMAS", "CEMTS", "CEMZY", "CIMSA", "CLEBI", "CONSE", "COSMO", "CRDFA", "CRFSA", "CUSAN",
    "CVKMD", "CWENE", "DAGHL", "DAGI", "DAPGM", "DARDL", "DCTTR", "DENGE", "DERHL", "DERIM",
    "DESA", "DESPC", "DEVA", "DGATE", "DGNMO", "DIRIT", "DITAS", "DMRGD", "DMSAS", "DNISI",
    "DOAS", "DOBUR", "DOCO", "DOFER", "DOGUB", "DOHOL", "DOKTA", "DURDO", "DURKN", "DZGYO",
    "ECILC", "ECZYT", "EDATA", "EDIP", "EFORC", "EGEEN", "EGGUB", "EGPRO", "EGSER", "EKGYO",
    "EKIZ", "ELITE", "EMKEL", "EMNIS", "ENJSA", "ENKAI", "ENSRI", "ERBOS", "EREGL", "ERSU",
    "ESCAR", "ESCOM", "ESEN", "ETILR", "ETYAT", "EUKYO", "EUREN", "EUYO", "FADE", "FENER",
    "FLAP", "FMIZP", "FONET", "FORMT", "FORTE", "FRIGO", "FROTO", "FZLGY", "GARAN", "GARFA",
    "GEDIK", "GEDZA", "GENIL", "GENTS", "GESAN", "GIPTA", "GLBMD", "GLCVY", "GLRYH", "GLYHO",
    "GMTAS", "GOKNR", "GOLTS", "GOODY", "GOZDE", "GRNYO", "GRSEL", "GRTHO", "GSDDE", "GSDHO",
    "GSRAY", "GUBRF", "GUNDG", "GWIND", "GZNMI", "HALKB", "HATEK", "HATSN", "HDFGS", "HEDEF",
    "HEKTS", "HKTM", "HLGYO", "HOROZ", "HRKET", "HTTBT", "HUBVC", "HUNER", "HURGZ", "ICBCT",
    "ICUGS", "IDGYO", "IEYHO", "IHAAS", "IHEVA", "IHGZT", "IHLAS", "IHLGM", "IHYAY", "IMASM",
    "INDES", "INGRM", "INTEK", "INTEM", "INVEO", "INVES", "IPEKE", "ISATR", "ISBIR", "ISBTR",
    "ISCTR", "ISDMR", "ISFIN", "ISGSY", "ISGYO", "ISKPL", "ISKUR", "ISMEN", "ISSEN", "ISYAT",
    "IZENR", "IZFAS", "IZINV", "IZMDC", "JANTS", "KAPLM", "KAREL", "KARSN", "KARTN", "KARYE",
    "KATMR", "KAYSE", "KCAER", "KCHOL", "KFEIN", "KGYO", "KIMMR", "KLGYO", "KLKIM", "KLMSN",
    "KLNMA", "KLRHO", "KLSER", "KLSYN", "KMPUR", "KNFRT", "KONKA", "KONTR", "KONYA", "KOPOL",
    "KORDS", "KRDMA", "KRDMB", "KRDMD", "KRGYO", "KRONT", "KRPLS", "KRSTL", "KRTEK", "KRVGD",
    "KSTUR", "KTLEV", "KUVVA", "KUYAS", "KZBGY", "KZGYO", "LIDER", "LIDFA", "LILAK", "LINK",
    "LKMNH", "LMKDC", "LOGO", "LRSHO", "LUKSK", "LYDHO", "MAALT", "MACKO", "MAGEN", "MAKIM",
    "MAKTK", "MANAS", "MARKA", "MARTI", "MAVI", "MEGAP", "MEGMT", "MEKAG", "MERCN", "MERIT",
    "MERKO", "METRO", "METUR", "MGROS", "MIATK", "MNDRS", "MNDTR", "MOBTL", "MOGAN", "MPARK",
    "MRGYO", "MRSHL", "MSGYO", "MTRKS", "MTRYO", "MZHLD", "NATEN", "NETAS", "NIBAS", "NTHOL",
    "NUGYO", "NUHCM", "OBAMS", "OBASE", "ODAS", "ODINE", "OFSYM", "ONCSM", "ONRYT", "ORCAY",
    "ORGE", "ORMA", "OSMEN", "OSTIM", "OTKAR", "OTTO", "OYAKC", "OYAYO", "OYLUM", "OZATD",
    "OZGYO", "OZKGY", "OZRDN", "OZSRY", "OZSUB", "PAGYO", "PAMEL", "PAPIL", "PARSN", "PASEU",
    "PATEK", "PCILT", "PEHOL", "PEKGY", "PENGD", "PENTA", "PETKM", "PETUN", "PGSUS", "PKART",
    "PKENT", "PNSUT", "POLHO", "POLTK", "PRDGS", "PRKAB", "PRKME", "PRZMA", "PSDTC", "PSGYO",
    "QNBFB", "QNBFL", "QUAGR", "RALYH", "RAYSG", "RNPOL", "RODRG", "ROYAL", "RTALB", "RUBNS",
    "RYGYO", "RYSAS", "SAFKR", "SAHOL", "SAMAT", "SANEL", "SANFM", "SANKO", "SARKY", "SASA",
    "SAYAS", "SEGYO", "SEKFK", "SELEC", "SELGD", "SELVA", "SEYKM", "SILVR", "SISE", "SKBNK",
    "SKTAS", "SMART", "SMRTG", "SNGYO", "SNICA", "SNKRN", "SODSN", "SOKE", "SONME", "SUMAS",
    "SUNTK", "SURGY", "SUWEN", "TABGD", "TATEN", "TATGD", "TAVHL", "TBORG", "TCELL", "TCKRC",
    "TDGYO", "TEKTU", "TERA", "TEZOL", "THYAO", "TKFEN", "TKNSA", "TLMAN", "TMSN", "TOASO",
    "TRCAS", "TRGYO", "TRILC", "TSGYO", "TSKB", "TSPOR", "TTKOM", "TTRAK", "TUPRS", "TUREX",
    "TURGG", "UFUK", "ULAS", "ULKER", "ULUFA", "ULUSE", "ULUUN", "UNLU", "USAK", "VAKBN",
    "VAKFN", "VAKKO", "VANGD", "VBTYZ", "VERTU", "VERUS", "VESBE", "VESTL", "VKFYO", "VKGYO",
    "VKING", "YAPRK", "YATAS", "YAYLA", "YBTAS", "YEOTK", "YESIL", "YGYO", "YIGIT", "YKBNK",
    "YKSLN", "YONGA", "YUNSA", "YYAPI", "YYLGD", "ZEDUR", "ZOREN", "ZRGYO",
];
