//! Symbolic endpoint names and their upstream definitions.

use std::collections::HashMap;

use enom_common::ApiConfig;
use tracing::debug;

use crate::endpoint::EndpointSpec;
use crate::error::ApiError;
use crate::pipeline::Pipeline;

#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, EndpointSpec>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an endpoint.
    pub fn register(&mut self, spec: EndpointSpec) {
        if self.endpoints.insert(spec.name.clone(), spec).is_some() {
            debug!("Replaced existing endpoint definition");
        }
    }

    pub fn resolve(&self, name: &str) -> Result<&EndpointSpec, ApiError> {
        self.endpoints
            .get(name)
            .ok_or_else(|| ApiError::NotFound(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// The desktop client's endpoint table, rooted at the configured hosts.
    pub fn builtin(api: &ApiConfig) -> Self {
        let base = api.api_base.trim_end_matches('/');
        let www = api.www_base.trim_end_matches('/');
        let url = |path: &str| format!("{base}{path}");

        let mut registry = Self::new();
        let mut add = |spec: EndpointSpec| registry.register(spec);

        add(EndpointSpec::get("getCookie", www).pipeline(Pipeline::raw()));

        // Music charts and menus
        add(EndpointSpec::get("getRank", url("/x/copyright-music-publicity/toplist/all_period"))
            .param("list_type", 1));
        add(EndpointSpec::get("getRankDetail", url("/x/copyright-music-publicity/toplist/detail"))
            .param("list_id", 0));
        add(EndpointSpec::get(
            "getRankDetailList",
            url("/x/copyright-music-publicity/toplist/music_list"),
        )
        .param("list_id", 0));
        add(EndpointSpec::get("getMusicRankList", url("/x/copyright-music-publicity/toplist/all_period"))
            .param("list_type", 1));
        add(EndpointSpec::get("getMusicRank", url("/x/copyright-music-publicity/toplist/music_list"))
            .param("list_id", 207));
        add(EndpointSpec::get("getSongDetail", url("/audio/music-service-c/web/song/info"))
            .param("sid", 0));
        add(EndpointSpec::get("getSongInfo", url("/audio/music-service-c/web/song/info"))
            .param("sid", 0));
        add(EndpointSpec::get("getSong", url("/audio/music-service-c/web/url")).param("sid", 0));
        add(EndpointSpec::get("getHitSong", url("/audio/music-service-c/web/menu/hit"))
            .param("ps", 20)
            .param("pn", 1));
        add(EndpointSpec::get("getHitSongList", url("/audio/music-service-c/web/song/of-menu"))
            .param("sid", 0)
            .param("ps", 100)
            .param("pn", 1));
        add(EndpointSpec::get("getMenuRank", url("/audio/music-service-c/web/menu/rank"))
            .param("ps", 3)
            .param("pn", 1));

        // Video
        add(EndpointSpec::get("search", url("/x/web-interface/search/type"))
            .param("page", 1)
            .param("page_size", 42)
            .param("platform", "pc")
            .param("highlight", 1)
            .param("single_column", 0)
            .param("keyword", "")
            .param("category_id", "")
            .param("search_type", "video")
            .param("dynamic_offset", 0)
            .param("preload", true)
            .param("com2co", true)
            .signed());
        add(EndpointSpec::get("getAudioOfVideo", url("/x/player/playurl"))
            .param("fnval", 16)
            .param("bvid", "")
            .param("cid", 0));
        add(EndpointSpec::get("getVideoInfo", url("/x/web-interface/view")).param("bvid", ""));
        add(EndpointSpec::get("getRanking", url("/x/web-interface/ranking/v2")).param("tid", 3));

        // Users
        add(EndpointSpec::get("getUserInfo", url("/x/web-interface/card")).param("mid", 0));
        add(EndpointSpec::get("getNav", url("/x/web-interface/nav")));
        add(EndpointSpec::get("getUserArc", url("/x/space/wbi/arc/search"))
            .param("mid", 0)
            .param("pn", 1)
            .param("ps", 25)
            .param("tid", 3)
            .param("keyword", "")
            .param("order", "pubdate")
            .signed());
        add(EndpointSpec::post("relationModify", url("/x/relation/modify"))
            .header("Origin", www)
            .body_field("fid", 0)
            .body_field("act", 1)
            .body_field("re_src", 11)
            .csrf());

        // Favorites
        add(EndpointSpec::get("getFavInfo", url("/x/v3/fav/resource/list"))
            .param("media_id", 0)
            .param("ps", 20)
            .param("pn", 1));
        add(EndpointSpec::get("getFavResourceList", url("/x/v3/fav/resource/list"))
            .param("media_id", 0)
            .param("pn", 1)
            .param("ps", 20));
        add(EndpointSpec::get("getFavList", url("/x/v3/fav/folder/created/list-all"))
            .param("up_mid", 0)
            .param("type", 0));
        add(EndpointSpec::get("getCollectedFavList", url("/x/v3/fav/folder/collected/list"))
            .param("up_mid", 0)
            .param("pn", 1)
            .param("ps", 20)
            .param("platform", "web"));
        add(EndpointSpec::post("addSongToFav", url("/x/v3/fav/resource/deal"))
            .header("Origin", www)
            .body_field("rid", 0)
            .body_field("type", 2)
            .body_field("add_media_ids", "")
            .csrf());
        add(EndpointSpec::post("delSongFromFav", url("/x/v3/fav/resource/deal"))
            .header("Origin", www)
            .body_field("rid", 0)
            .body_field("type", 2)
            .body_field("del_media_ids", "")
            .csrf());
        add(EndpointSpec::post("createFavFolder", url("/x/v3/fav/folder/add"))
            .header("Origin", www)
            .body_field("title", "")
            .body_field("intro", "")
            .body_field("privacy", 0)
            .csrf());

        // Collections and series
        add(EndpointSpec::get(
            "getCollectionInfo",
            url("/x/polymer/web-space/seasons_archives_list"),
        )
        .param("mid", 0)
        .param("season_id", 0)
        .param("sort_reverse", false)
        .param("page_num", 1)
        .param("page_size", 30));
        add(EndpointSpec::get("getSeriesInfo", url("/x/series/archives"))
            .param("mid", 0)
            .param("series_id", 0)
            .param("only_normal", true)
            .param("sort", "desc")
            .param("pn", 1)
            .param("ps", 20));
        add(EndpointSpec::get(
            "getSeasonsSeriesList",
            url("/x/polymer/web-space/seasons_series_list"),
        )
        .param("mid", 0)
        .param("page_num", 1)
        .param("page_size", 20));

        registry
    }
}
